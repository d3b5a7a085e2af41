// Chart catalog: which tags each chart plots and how every tag is styled
use super::tag::TagName;
use super::telemetry::Axis;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const FALLBACK_COLOR: &str = "#888888";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDefinition {
    pub id: String,
    pub title: String,
    pub tags: Vec<TagName>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagStyle {
    pub color: String,
    pub axis: Axis,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartCatalog {
    pub charts: Vec<ChartDefinition>,
    #[serde(skip)]
    styles: HashMap<TagName, TagStyle>,
    #[serde(skip)]
    secondary_axis: HashSet<TagName>,
    #[serde(skip)]
    writable: HashSet<TagName>,
    #[serde(skip)]
    setpoint_prefix: String,
}

impl ChartCatalog {
    /// Colours are assigned per distinct tag in order of first appearance across
    /// `charts`, cycling through `palette`.
    pub fn new(
        charts: Vec<ChartDefinition>,
        palette: &[String],
        secondary_axis: HashSet<TagName>,
        writable: HashSet<TagName>,
        setpoint_prefix: String,
    ) -> Self {
        let mut styles = HashMap::new();
        let mut next = 0usize;
        for tag in charts.iter().flat_map(|c| c.tags.iter()) {
            if styles.contains_key(tag) {
                continue;
            }
            let color = if palette.is_empty() {
                FALLBACK_COLOR.to_string()
            } else {
                palette[next % palette.len()].clone()
            };
            next += 1;
            let axis = if secondary_axis.contains(tag) {
                Axis::Secondary
            } else {
                Axis::Primary
            };
            styles.insert(tag.clone(), TagStyle { color, axis });
        }

        Self {
            charts,
            styles,
            secondary_axis,
            writable,
            setpoint_prefix,
        }
    }

    pub fn chart(&self, id: &str) -> Option<&ChartDefinition> {
        self.charts.iter().find(|c| c.id == id)
    }

    /// Tags outside every chart definition still get a neutral style.
    pub fn style(&self, tag: &TagName) -> TagStyle {
        self.styles.get(tag).cloned().unwrap_or_else(|| TagStyle {
            color: FALLBACK_COLOR.to_string(),
            axis: if self.secondary_axis.contains(tag) {
                Axis::Secondary
            } else {
                Axis::Primary
            },
        })
    }

    pub fn is_writable(&self, tag: &TagName) -> bool {
        self.writable.contains(tag)
    }

    /// `charge` becomes `<prefix>Charge`.
    pub fn setpoint_tag(&self, key: &str) -> Option<TagName> {
        let mut chars = key.chars();
        let first = chars.next()?;
        let name = format!(
            "{}{}{}",
            self.setpoint_prefix,
            first.to_uppercase(),
            chars.as_str()
        );
        TagName::new(name).ok()
    }
}

#[cfg(test)]
pub(crate) fn sample_catalog() -> ChartCatalog {
    let tag = |s: &str| TagName::new(s).unwrap();
    let charts = vec![
        ChartDefinition {
            id: "power".into(),
            title: "Power".into(),
            tags: vec![tag("A25_Power"), tag("A25_Speed"), tag("A25_Energy")],
        },
        ChartDefinition {
            id: "vibration".into(),
            title: "Vibration".into(),
            tags: vec![tag("VT001.Scaled"), tag("VT002.Scaled"), tag("A25_Speed")],
        },
    ];
    let palette: Vec<String> = ["#3498db", "#e74c3c", "#2ecc71", "#f1c40f"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    ChartCatalog::new(
        charts,
        &palette,
        HashSet::from([tag("A25_Speed")]),
        HashSet::from([tag("A25_SIM_Charge"), tag("EM_SV")]),
        "A25_SIM_".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_follow_first_appearance() {
        let catalog = sample_catalog();
        let style = |s: &str| catalog.style(&TagName::new(s).unwrap());

        assert_eq!(style("A25_Power").color, "#3498db");
        assert_eq!(style("A25_Speed").color, "#e74c3c");
        assert_eq!(style("A25_Energy").color, "#2ecc71");
        assert_eq!(style("VT001.Scaled").color, "#f1c40f");
        // Palette wraps around.
        assert_eq!(style("VT002.Scaled").color, "#3498db");
        assert_eq!(style("Unknown_Tag").color, FALLBACK_COLOR);
    }

    #[test]
    fn test_secondary_axis() {
        let catalog = sample_catalog();
        let speed = TagName::new("A25_Speed").unwrap();
        let power = TagName::new("A25_Power").unwrap();
        assert_eq!(catalog.style(&speed).axis, Axis::Secondary);
        assert_eq!(catalog.style(&power).axis, Axis::Primary);
    }

    #[test]
    fn test_setpoint_tag() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.setpoint_tag("charge").map(String::from),
            Some("A25_SIM_Charge".to_string())
        );
        assert_eq!(catalog.setpoint_tag(""), None);
        assert!(catalog.is_writable(&catalog.setpoint_tag("charge").unwrap()));
        assert!(!catalog.is_writable(&catalog.setpoint_tag("discharge").unwrap()));
    }
}
