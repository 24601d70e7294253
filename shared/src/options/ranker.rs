use crate::options::catalog::ComponentDescriptor;

/// Scores how well a substitute stands in for an original component.
///
/// Returns a matching degree in `0..=100`.
pub trait SubstituteRanker {
    fn matching_degree(&self, original: &ComponentDescriptor, candidate: &ComponentDescriptor) -> u8;
}

/// Percentage of the original's required capability triples that the
/// candidate exposes. An original without requirements scores 100.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapabilityCoverageRanker;

impl SubstituteRanker for CapabilityCoverageRanker {
    fn matching_degree(&self, original: &ComponentDescriptor, candidate: &ComponentDescriptor) -> u8 {
        let required = &original.required_capabilities;
        if required.is_empty() {
            return 100;
        }

        let covered = required
            .iter()
            .filter(|triple| candidate.exposed_capabilities.contains(triple))
            .count();

        ((covered * 100) / required.len()) as u8
    }
}
