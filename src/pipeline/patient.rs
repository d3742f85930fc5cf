use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::PatientHistory;

/// Source of stored patient history, keyed by an opaque patient id.
pub trait PatientStore: Send + Sync {
    fn patient_context(&self, patient_id: &str) -> Option<PatientHistory>;
}

#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    histories: RwLock<HashMap<String, PatientHistory>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, patient_id: impl Into<String>, history: PatientHistory) {
        let mut histories = match self.histories.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        histories.insert(patient_id.into(), history);
    }
}

impl PatientStore for InMemoryPatientStore {
    fn patient_context(&self, patient_id: &str) -> Option<PatientHistory> {
        let histories = match self.histories.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        histories.get(patient_id).cloned()
    }
}
