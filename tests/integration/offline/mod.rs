mod orchestrator;
mod reconciliation;
mod recovery;
mod signatures;
