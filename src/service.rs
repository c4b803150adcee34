use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::sleep
};
use tracing::{debug, info, warn};

use crate::{
    api::{api_structs::LookupResults, LookupError, RatingLookup},
    config::BalanceConfig,
    database::KeyValueStore,
    host::{ChatChannel, GameHost},
    model::{
        balancer::{BalanceError, BalanceOutcome, SwapSuggestion, TeamSnapshot},
        name_tracker::LookupId,
        resolver::{RequestId, ResolveRequest},
        structures::{category::Category, participant::ParticipantId}
    },
    session::{
        commands::CommandError,
        events::{EventResponse, GameEvent},
        Continuation, DelayedAction, Dispatch, Session
    }
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("balance service is not running")]
    Closed,

    /// The request was abandoned, e.g. after a resolution fault.
    #[error("balance service dropped the request")]
    Dropped,

    #[error(transparent)]
    Balance(#[from] BalanceError)
}

#[derive(Debug)]
pub enum ServiceMessage {
    Event {
        event: GameEvent,
        reply: Option<oneshot::Sender<EventResponse>>
    },
    Command {
        caller: ParticipantId,
        channel: ChatChannel,
        args: Vec<String>
    },
    Resolve {
        participants: Vec<ParticipantId>,
        category: Category,
        reply: oneshot::Sender<HashMap<ParticipantId, i32>>
    },
    Suggest {
        snapshot: TeamSnapshot,
        category: Category,
        reply: oneshot::Sender<Option<SwapSuggestion>>
    },
    Balance {
        snapshot: TeamSnapshot,
        category: Category,
        reply: oneshot::Sender<Result<BalanceOutcome, BalanceError>>
    },
    LookupFinished {
        lookup: LookupId,
        outcome: Result<LookupResults, LookupError>
    },
    Wake(RequestId),
    Delayed(DelayedAction),
    Shutdown
}

/// Runs a [`Session`] as the only writer of its state.
///
/// Every input, including lookup results and timer expiries, arrives on one channel and is
/// handled to completion before the next one is read.
pub struct BalanceService<H, S> {
    session: Session,
    host: H,
    store: S,
    lookup: Arc<dyn RatingLookup>,
    sender: mpsc::UnboundedSender<ServiceMessage>,
    receiver: mpsc::UnboundedReceiver<ServiceMessage>
}

impl<H, S> BalanceService<H, S>
where
    H: GameHost + Send + 'static,
    S: KeyValueStore + Send + 'static
{
    pub fn new(config: BalanceConfig, host: H, store: S, lookup: Arc<dyn RatingLookup>) -> BalanceService<H, S> {
        let (sender, receiver) = mpsc::unbounded_channel();

        BalanceService {
            session: Session::new(config),
            host,
            store,
            lookup,
            sender,
            receiver
        }
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            sender: self.sender.clone()
        }
    }

    /// Processes messages until [`ServiceMessage::Shutdown`], then hands back the host and
    /// store.
    pub async fn run(mut self) -> (H, S) {
        info!("Balance service started");

        while let Some(message) = self.receiver.recv().await {
            if let ServiceMessage::Shutdown = message {
                break;
            }

            let dispatches = self.process(message);
            self.dispatch(dispatches);
        }

        info!(
            parked = self.session.resolver().parked_requests(),
            "Balance service stopped"
        );
        (self.host, self.store)
    }

    fn process(&mut self, message: ServiceMessage) -> Vec<Dispatch> {
        let host = &mut self.host;
        let store = &mut self.store;

        match message {
            ServiceMessage::Event { event, reply } => {
                let (response, dispatches) = self.session.handle_event(event, host, store);
                if let Some(reply) = reply {
                    let _ = reply.send(response);
                }
                dispatches
            }
            ServiceMessage::Command { caller, channel, args } => {
                let args = args.iter().map(String::as_str).collect::<Vec<_>>();

                match self.session.handle_command(caller, channel, &args, host, store) {
                    Ok(dispatches) => dispatches,
                    Err(err @ CommandError::Usage { .. }) => {
                        host.send(channel, &format!("Usage: {}", err.to_string().trim_start_matches("usage: ")));
                        Vec::new()
                    }
                    Err(err) => {
                        debug!(%caller, %err, "Ignoring command");
                        Vec::new()
                    }
                }
            }
            ServiceMessage::Resolve {
                participants,
                category,
                reply
            } => {
                let request = ResolveRequest::new(participants, category, Continuation::Ratings(reply));
                self.session.resolve(request, host, store)
            }
            ServiceMessage::Suggest {
                snapshot,
                category,
                reply
            } => self.session.suggest(snapshot, category, reply, host, store),
            ServiceMessage::Balance {
                snapshot,
                category,
                reply
            } => self.session.balance(snapshot, category, reply, host, store),
            ServiceMessage::LookupFinished { lookup, outcome } => {
                self.session.lookup_finished(lookup, outcome, host, store)
            }
            ServiceMessage::Wake(request) => self.session.wake(request, host, store),
            ServiceMessage::Delayed(action) => self.session.run_delayed(action, host, store),
            ServiceMessage::Shutdown => Vec::new()
        }
    }

    fn dispatch(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            let sender = self.sender.clone();

            match dispatch {
                Dispatch::Lookup(job) => {
                    let lookup = job.id;
                    debug!(%lookup, names = ?job.names, "Dispatching lookup");
                    let request = self.lookup.lookup(job.names);

                    tokio::spawn(async move {
                        let outcome = request.await;
                        if let Err(err) = &outcome {
                            warn!(%lookup, %err, "Rating lookup failed");
                        }
                        let _ = sender.send(ServiceMessage::LookupFinished { lookup, outcome });
                    });
                }
                Dispatch::Wake { request, delay } => {
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = sender.send(ServiceMessage::Wake(request));
                    });
                }
                Dispatch::Delayed { delay, action } => {
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = sender.send(ServiceMessage::Delayed(action));
                    });
                }
            }
        }
    }
}

/// Cloneable entry point into a running [`BalanceService`].
#[derive(Clone)]
pub struct ServiceHandle {
    sender: mpsc::UnboundedSender<ServiceMessage>
}

impl ServiceHandle {
    pub async fn event(&self, event: GameEvent) -> Result<EventResponse, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(ServiceMessage::Event {
            event,
            reply: Some(reply)
        })?;
        response.await.map_err(|_| ServiceError::Dropped)
    }

    pub fn command(&self, caller: ParticipantId, channel: ChatChannel, args: &[&str]) -> Result<(), ServiceError> {
        self.send(ServiceMessage::Command {
            caller,
            channel,
            args: args.iter().map(|arg| arg.to_string()).collect()
        })
    }

    /// Ratings for `participants`, fetching whatever is missing.
    pub async fn resolve(
        &self,
        participants: Vec<ParticipantId>,
        category: Category
    ) -> Result<HashMap<ParticipantId, i32>, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(ServiceMessage::Resolve {
            participants,
            category,
            reply
        })?;
        response.await.map_err(|_| ServiceError::Dropped)
    }

    pub async fn suggest(
        &self,
        snapshot: TeamSnapshot,
        category: Category
    ) -> Result<Option<SwapSuggestion>, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(ServiceMessage::Suggest {
            snapshot,
            category,
            reply
        })?;
        response.await.map_err(|_| ServiceError::Dropped)
    }

    pub async fn balance(&self, snapshot: TeamSnapshot, category: Category) -> Result<BalanceOutcome, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(ServiceMessage::Balance {
            snapshot,
            category,
            reply
        })?;
        Ok(response.await.map_err(|_| ServiceError::Dropped)??)
    }

    pub fn shutdown(&self) -> Result<(), ServiceError> {
        self.send(ServiceMessage::Shutdown)
    }

    fn send(&self, message: ServiceMessage) -> Result<(), ServiceError> {
        self.sender.send(message).map_err(|_| ServiceError::Closed)
    }
}
