//! Accident-type diagram catalog
//!
//! Only the routing-relevant part of the catalog lives here: which diagrams
//! exist, which section they belong to, and which of them open the infraction
//! attribution sub-decision. Images, descriptions of each diagram and the
//! initial responsibility split belong to the presentation layer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::WorkflowConfig;

/// One section of the diagram catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSection {
    /// Numeric section id (1 = "Sección I")
    pub id: u8,
    /// Display title
    pub title: String,
    /// What kind of accident the section covers
    pub description: String,
    /// Diagram ids in display order
    pub diagrams: Vec<String>,
}

/// A resolved catalog entry for a diagram id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramEntry {
    /// Diagram id, e.g. `IV-2`
    pub diagram_id: String,
    /// Section the diagram belongs to
    pub section_id: u8,
    /// Title of that section
    pub section_title: String,
    /// Whether picking this diagram opens the infraction attribution step
    pub requires_infraction_attribution: bool,
}

/// Catalog of accident-type diagrams
#[derive(Debug, Clone)]
pub struct DiagramCatalog {
    sections: Vec<DiagramSection>,
    infraction_diagrams: HashSet<String>,
}

fn section(id: u8, title: &str, description: &str, prefix: &str, count: usize) -> DiagramSection {
    DiagramSection {
        id,
        title: title.to_string(),
        description: description.to_string(),
        diagrams: (1..=count).map(|n| format!("{}-{}", prefix, n)).collect(),
    }
}

impl DiagramCatalog {
    /// The standard catalog with the signal-controlled intersection (`IV-2`)
    /// as the only branch diagram
    pub fn standard() -> Self {
        let sections = vec![
            section(1, "Sección I", "Vehículos transitando en la misma dirección y en el mismo carril", "I", 4),
            section(2, "Sección II", "Vehículos transitando en la misma dirección pero por carriles distintos", "II", 3),
            section(3, "Sección III", "Vehículos transitando por carriles de direcciones opuestas", "III", 5),
            section(4, "Sección IV", "Accidentes en intersecciones, con o sin señales de tránsito", "IV", 5),
            section(5, "Sección V", "Accidentes en áreas de estacionamiento o al salir de ellas", "V", 8),
            section(6, "Sección VI", "Virajes en \"U\" y accidentes por apertura de puertas", "VI", 6),
            section(7, "Sección VII", "Otros tipos de accidentes de tránsito", "VII", 0),
        ];

        Self {
            sections,
            infraction_diagrams: ["IV-2".to_string()].into_iter().collect(),
        }
    }

    /// Standard catalog with the branch set taken from configuration
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::standard().with_infraction_diagrams(config.infraction_diagrams.iter().cloned())
    }

    /// Build a catalog from explicit sections
    pub fn new(sections: Vec<DiagramSection>) -> Self {
        Self {
            sections,
            infraction_diagrams: HashSet::new(),
        }
    }

    /// Replace the set of diagrams that open the infraction attribution step
    pub fn with_infraction_diagrams<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.infraction_diagrams = ids.into_iter().map(Into::into).collect();
        self
    }

    /// All sections in display order
    pub fn sections(&self) -> &[DiagramSection] {
        &self.sections
    }

    /// Resolve a diagram id
    pub fn lookup(&self, diagram_id: &str) -> Option<DiagramEntry> {
        self.sections.iter().find_map(|section| {
            section
                .diagrams
                .iter()
                .any(|id| id == diagram_id)
                .then(|| DiagramEntry {
                    diagram_id: diagram_id.to_string(),
                    section_id: section.id,
                    section_title: section.title.clone(),
                    requires_infraction_attribution: self.infraction_diagrams.contains(diagram_id),
                })
        })
    }

    /// Whether a diagram opens the infraction attribution step
    #[inline]
    pub fn requires_infraction_attribution(&self, diagram_id: &str) -> bool {
        self.infraction_diagrams.contains(diagram_id)
    }
}

impl Default for DiagramCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_resolves_section() {
        let catalog = DiagramCatalog::standard();
        let entry = catalog.lookup("IV-2").unwrap();
        assert_eq!(entry.section_id, 4);
        assert_eq!(entry.section_title, "Sección IV");
        assert!(entry.requires_infraction_attribution);

        let entry = catalog.lookup("V-8").unwrap();
        assert_eq!(entry.section_id, 5);
        assert!(!entry.requires_infraction_attribution);
    }

    #[test]
    fn test_only_signal_controlled_intersection_branches() {
        let catalog = DiagramCatalog::standard();
        let branching: Vec<String> = catalog
            .sections()
            .iter()
            .flat_map(|s| s.diagrams.iter())
            .filter(|id| catalog.requires_infraction_attribution(id))
            .cloned()
            .collect();
        assert_eq!(branching, vec!["IV-2".to_string()]);
    }

    #[test]
    fn test_unknown_diagram() {
        let catalog = DiagramCatalog::standard();
        assert!(catalog.lookup("VIII-1").is_none());
        assert!(catalog.lookup("IV-6").is_none());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn test_configured_branch_set() {
        let mut config = WorkflowConfig::default();
        config.infraction_diagrams = vec!["IV-3".to_string()];
        let catalog = DiagramCatalog::from_config(&config);
        assert!(catalog.lookup("IV-3").unwrap().requires_infraction_attribution);
        assert!(!catalog.lookup("IV-2").unwrap().requires_infraction_attribution);
    }

    #[test]
    fn test_section_without_diagrams() {
        let catalog = DiagramCatalog::standard();
        let other = catalog.sections().iter().find(|s| s.id == 7).unwrap();
        assert!(other.diagrams.is_empty());
    }
}
