use crate::audit::Actor;
use crate::ingest::Ingestor;
use crate::store::FleetStore;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub store: FleetStore,
    /// Operator that API-driven actions are attributed to.
    pub operator: Actor,
}

impl AppState {
    pub fn new(ingestor: Ingestor, operator: Actor) -> Self {
        let store = ingestor.store().clone();
        Self {
            ingestor,
            store,
            operator,
        }
    }
}
