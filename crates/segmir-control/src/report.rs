//! Per-item outcomes of operations that touch many devices.

use crate::device::Identity;
use crate::error::MirrorError;

/// One result per device an operation addressed, in the order addressed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<(Identity, Result<(), MirrorError>)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: Identity, result: Result<(), MirrorError>) {
        self.items.push((identity, result));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.items.iter().all(|(_, r)| r.is_ok())
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Identity, &MirrorError)> {
        self.items
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    /// First failure, if any.
    pub fn into_result(self) -> Result<(), MirrorError> {
        self.items
            .into_iter()
            .find_map(|(_, r)| r.err())
            .map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmir_topology::PanelPosition;

    #[test]
    fn report_counts_failures() {
        let a = Identity::Panel(PanelPosition::new(1111).expect("pos"));
        let b = Identity::Panel(PanelPosition::new(1112).expect("pos"));
        let mut report = BatchReport::new();
        report.push(a, Ok(()));
        report.push(b, Err(MirrorError::InvalidArgument("x".into())));
        assert_eq!(report.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert!(!report.is_success());
        assert_eq!(report.failures().map(|(id, _)| *id).collect::<Vec<_>>(), vec![b]);
        assert!(report.into_result().is_err());
        assert!(BatchReport::new().into_result().is_ok());
    }
}
