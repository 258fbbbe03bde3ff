use super::composition::{Composition, CompositionError};
use nalgebra::Point3;

#[derive(Debug, Clone, PartialEq)]
pub struct StructureAtom {
    pub element: String,
    pub position: Point3<f64>,
}

impl StructureAtom {
    pub fn new(element: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            element: element.into(),
            position,
        }
    }
}

/// A final geometry as produced by the simulation engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub comment: String,
    pub atoms: Vec<StructureAtom>,
}

impl Structure {
    pub fn new(comment: impl Into<String>, atoms: Vec<StructureAtom>) -> Self {
        Self {
            comment: comment.into(),
            atoms,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Element multiset of the structure.
    ///
    /// # Errors
    ///
    /// Fails for an empty structure or an unknown element symbol.
    pub fn composition(&self) -> Result<Composition, CompositionError> {
        Composition::new(self.atoms.iter().map(|a| (a.element.as_str(), 1)))
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum = self
            .atoms
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, a| acc + a.position.coords);
        Some(Point3::from(sum / self.atoms.len() as f64))
    }
}
