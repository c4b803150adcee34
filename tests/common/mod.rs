use std::sync::Once;

use rating_balancer::{
    database::memory::MemoryStore,
    host::roster::RosterHost,
    session::{Dispatch, Session},
    utils::test_utils::StubLookup
};

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Answers every lookup in `dispatches` from `stub`, including lookups started by those
/// answers, and returns whatever else was dispatched.
pub fn settle_lookups(
    session: &mut Session,
    host: &mut RosterHost,
    kv: &mut MemoryStore,
    stub: &StubLookup,
    dispatches: Vec<Dispatch>
) -> Vec<Dispatch> {
    let mut queue = dispatches;
    let mut rest = Vec::new();

    while let Some(dispatch) = queue.pop() {
        match dispatch {
            Dispatch::Lookup(job) => {
                let outcome = stub.answer(&job.names);
                queue.extend(session.lookup_finished(job.id, outcome, host, kv));
            }
            other => rest.push(other)
        }
    }

    rest
}
