//! The router: owns every definition, drives activations one at a time and
//! publishes the resulting snapshot.

mod events;
mod flight;

pub use events::{Observer, RouterEvent};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use self::flight::{Flight, Settle, Target, Via};
use crate::config::Config;
use crate::definition::{activation, Initializer, StateDefinition};
use crate::location::Location;
use crate::path::{location_path, normalize_url};
use crate::{lock, read, write, ActivationError, ActiveStates, Params, Redirect, RouterError, State};

/// Outcome of a navigation: the new leaf state, or `None` when an
/// initializer rejected the activation and the previous snapshot was kept.
pub type Navigation = Result<Option<Arc<State>>, RouterError>;

tokio::task_local! {
    // Identity of the router whose initializers the current task is running
    static DRIVING: usize;
}

#[derive(Default)]
struct Registry {
    definitions: Vec<Arc<StateDefinition>>,
    by_name: HashMap<String, usize>,
    default: Option<Redirect>,
}

impl Registry {
    fn get(&self, name: &str) -> Option<&Arc<StateDefinition>> {
        self.by_name.get(name).map(|&idx| &self.definitions[idx])
    }
}

#[derive(Default)]
struct Current {
    definition: Option<Arc<StateDefinition>>,
    params: Params,
}

struct Inner {
    config: Config,
    registry: RwLock<Registry>,
    flight: Mutex<Flight>,
    current: Mutex<Current>,
    active_tx: watch::Sender<Arc<ActiveStates>>,
    state_tx: watch::Sender<Option<Arc<State>>>,
    events: broadcast::Sender<RouterEvent>,
    observers: RwLock<Vec<Observer>>,
    location: Mutex<Option<Arc<dyn Location>>>,
    triggered_change: AtomicBool,
}

/// Non-owning handle held by states, so they can navigate without keeping
/// the router alive.
#[derive(Clone)]
pub(crate) struct WeakRouter(Weak<Inner>);

impl WeakRouter {
    pub fn upgrade(&self) -> Option<Router> {
        self.0.upgrade().map(|inner| Router { inner })
    }

    #[cfg(test)]
    pub fn detached() -> Self {
        WeakRouter(Weak::new())
    }
}

/// Hierarchical state router
///
/// Cheap to clone; clones share the same definitions and active states.
///
/// ```
/// use state_router::{inherit, params, Router};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let router = Router::new();
/// router
///     .state("a", "/a", inherit)?
///     .state("a.b", "/b/:id", inherit)?;
///
/// let state = router.set_url("/a/b/42").await?.unwrap();
/// assert_eq!(state.name(), "a.b");
/// assert_eq!(router.params(), params! { "id" => 42 });
/// # Ok::<_, state_router::RouterError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let (active_tx, _) = watch::channel(Arc::new(ActiveStates::default()));
        let (state_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(config.events.capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                config,
                registry: RwLock::new(Registry::default()),
                flight: Mutex::new(Flight::default()),
                current: Mutex::new(Current::default()),
                active_tx,
                state_tx,
                events,
                observers: RwLock::new(Vec::new()),
                location: Mutex::new(None),
                triggered_change: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers a state
    ///
    /// The parent (`app` for `app.users`) must already be registered.
    pub fn state<I: Initializer>(&self, name: &str, url: &str, init: I) -> Result<&Self, RouterError> {
        self.register(name, url, Box::new(init), false)
    }

    /// Registers a state without a url of its own
    ///
    /// It cannot be matched or linked to, only reached through `go`; its
    /// fragment still prefixes its children's urls.
    pub fn virtual_state<I: Initializer>(
        &self,
        name: &str,
        url: &str,
        init: I,
    ) -> Result<&Self, RouterError> {
        self.register(name, url, Box::new(init), true)
    }

    /// Sets the state used when no definition matches a url
    pub fn default(&self, name: &str, params: Params) -> &Self {
        write(&self.inner.registry).default = Some(Redirect {
            name: name.to_string(),
            params,
        });
        self
    }

    fn register(
        &self,
        name: &str,
        url: &str,
        init: Box<dyn Initializer>,
        is_virtual: bool,
    ) -> Result<&Self, RouterError> {
        let mut registry = write(&self.inner.registry);

        if registry.by_name.contains_key(name) {
            return Err(RouterError::DuplicateState(name.to_string()));
        }

        let parent = match name.rsplit_once('.') {
            Some((parent_name, _)) => Some(registry.get(parent_name).cloned().ok_or_else(|| {
                RouterError::MissingParent {
                    state: name.to_string(),
                    parent: parent_name.to_string(),
                }
            })?),
            None => None,
        };

        let definition = StateDefinition::new(
            name,
            url,
            parent,
            is_virtual,
            init,
            &self.inner.config.routing,
        )?;
        debug!(state = name, url = definition.url_pattern(), is_virtual, "registered state");

        let idx = registry.definitions.len();
        registry.definitions.push(Arc::new(definition));
        registry.by_name.insert(name.to_string(), idx);

        Ok(self)
    }

    /// Builds the signal an initializer returns to send the router elsewhere
    pub fn redirect(name: impl Into<String>, params: Params) -> ActivationError {
        ActivationError::redirect(name, params)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn definition(&self, name: &str) -> Result<Arc<StateDefinition>, RouterError> {
        read(&self.inner.registry)
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::UnknownState(name.to_string()))
    }

    /// Registered state names, in registration order
    pub fn state_names(&self) -> Vec<String> {
        read(&self.inner.registry)
            .definitions
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// The leaf of the published snapshot
    pub fn current_state(&self) -> Option<Arc<State>> {
        self.inner.state_tx.borrow().clone()
    }

    /// The published snapshot
    pub fn active_states(&self) -> Arc<ActiveStates> {
        self.inner.active_tx.borrow().clone()
    }

    /// Definition of the last successfully activated leaf
    pub fn current_definition(&self) -> Option<Arc<StateDefinition>> {
        lock(&self.inner.current).definition.clone()
    }

    /// Params of the last successful activation
    pub fn params(&self) -> Params {
        lock(&self.inner.current).params.clone()
    }

    pub fn is_activating(&self) -> bool {
        lock(&self.inner.flight).is_activating()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Option<Arc<State>>> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_active(&self) -> watch::Receiver<Arc<ActiveStates>> {
        self.inner.active_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.inner.events.subscribe()
    }

    /// Registers an observer called synchronously after each publication,
    /// in registration order
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&ActiveStates) + Send + Sync + 'static,
    {
        write(&self.inner.observers).push(Arc::new(observer));
    }

    /// Location-prefixed link to a state; missing params are taken from the
    /// active ones
    pub fn href(&self, name: &str, params: &Params) -> Result<String, RouterError> {
        let definition = self.definition(name)?;
        let url = definition.url(&self.fill_params(&definition, params))?;
        Ok(format!("{}{}", self.inner.config.location.prefix, url))
    }

    /// Whether `name` is in the active set and every given param matches
    pub fn is_active(&self, name: &str, params: &Params) -> bool {
        let active = self.active_states();
        active.contains(name)
            && params
                .iter()
                .all(|(key, value)| active.params().get(key) == Some(value))
    }

    /// Whether `name` is the current leaf
    pub fn is_current(&self, name: &str) -> bool {
        self.current_state().map_or(false, |s| s.name() == name)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Activates the state matching `url`, or the default state
    pub async fn set_url(&self, url: &str) -> Navigation {
        let target = self.resolve_url(url)?;
        self.navigate(target).await
    }

    /// Activates `name`
    ///
    /// Params not given are filled with the values currently active for the
    /// same names. While another activation is in flight, this navigation is
    /// deferred and resolves once the router settles on the latest target.
    ///
    /// Called from an initializer of this router's own running activation,
    /// it acts as a redirect instead: it returns [`RouterError::Deferred`]
    /// at once and the router activates `name` after the initializer
    /// returns, counting the hop toward `max_redirects`.
    pub async fn go(&self, name: &str, params: Params) -> Navigation {
        self.definition(name)?;
        self.navigate(Target::go(name, params)).await
    }

    fn resolve_url(&self, url: &str) -> Result<Target, RouterError> {
        let url = if self.inner.config.routing.normalize_urls {
            normalize_url(url)
        } else {
            Cow::Borrowed(url)
        };

        let registry = read(&self.inner.registry);

        let matched = registry
            .definitions
            .iter()
            .find_map(|def| def.matches(&url).map(|params| (def, params)));

        if let Some((def, params)) = matched {
            debug!(url = %url, state = def.name(), "url matched");
            return Ok(Target::url(def.name(), params));
        }

        if let Some(default) = &registry.default {
            debug!(url = %url, state = %default.name, "no match, using default state");
            return Ok(Target::go(default.name.clone(), default.params.clone()));
        }

        Err(RouterError::NoMatch(url.into_owned()))
    }

    fn fill_params(&self, definition: &StateDefinition, params: &Params) -> Params {
        let current = lock(&self.inner.current);
        let mut filled = params.clone();
        for name in definition.param_names() {
            if !filled.contains_key(name) {
                if let Some(value) = current.params.get(name) {
                    filled.insert(name.clone(), value.clone());
                }
            }
        }
        filled
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    async fn navigate(&self, target: Target) -> Navigation {
        if DRIVING.try_with(|id| *id == self.id()).unwrap_or(false) {
            debug!(to = %target.name, "navigation requested by an initializer, redirecting");
            let name = target.name.clone();
            lock(&self.inner.flight).redirect(target);
            return Err(RouterError::Deferred(name));
        }

        let claimed = lock(&self.inner.flight).claim(target);
        match claimed {
            Ok(target) => self.drive(target).await,
            Err(outcome) => {
                debug!("activation in flight, navigation deferred");
                outcome.await.unwrap_or(Err(RouterError::Aborted))
            }
        }
    }

    /// Runs activations until the router settles with nothing pending
    async fn drive(&self, mut target: Target) -> Navigation {
        let mut guard = FlightGuard {
            inner: &self.inner,
            armed: true,
        };
        let limit = self.inner.config.routing.max_redirects;
        let mut redirects = 0;

        loop {
            let step = self.step(&target).await;

            let pending = lock(&self.inner.flight).take_pending();
            let outcome = if let Some((next, redirected)) = pending {
                if let Ok((_, Ok(fresh))) = &step {
                    fresh.release_unless_held(&self.active_states());
                }
                if !redirected {
                    debug!(from = %target.name, to = %next.name, "superseded by a newer navigation");
                    target = next;
                    continue;
                }
                match count_redirect(&mut redirects, limit, &target) {
                    Ok(()) => {
                        debug!(from = %target.name, to = %next.name, "redirecting");
                        target = next;
                        continue;
                    }
                    Err(err) => Err(err),
                }
            } else {
                match step {
                    Ok((definition, Ok(snapshot))) => Ok(self.publish(&definition, snapshot, target.via)),
                    Ok((_, Err(ActivationError::Redirect(redirect)))) => {
                        match count_redirect(&mut redirects, limit, &target) {
                            Ok(()) => {
                                debug!(from = %target.name, to = %redirect.name, "redirecting");
                                target = Target::go(redirect.name, redirect.params);
                                continue;
                            }
                            Err(err) => Err(err),
                        }
                    }
                    Ok((definition, Err(ActivationError::Failed(err)))) => {
                        warn!(state = definition.name(), error = %err, "activation rejected");
                        self.emit(RouterEvent::Rejected {
                            state: definition.name().to_string(),
                            params: target.params.clone(),
                            reason: err.to_string(),
                        });
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            };

            let settled = lock(&self.inner.flight).settle();
            match settled {
                Settle::Next(next) => {
                    target = next;
                    continue;
                }
                Settle::Done(waiters) => {
                    guard.armed = false;
                    for waiter in waiters {
                        let _ = waiter.send(outcome.clone());
                    }
                    return outcome;
                }
            }
        }
    }

    /// One activation attempt, without publishing
    async fn step(
        &self,
        target: &Target,
    ) -> Result<(Arc<StateDefinition>, Result<ActiveStates, ActivationError>), RouterError> {
        let definition = self.definition(&target.name)?;
        let params = match target.via {
            Via::Go => self.fill_params(&definition, &target.params),
            Via::Url => target.params.clone(),
        };
        let previous = self.active_states();

        self.emit(RouterEvent::Activating {
            state: definition.name().to_string(),
            params: params.clone(),
        });

        let weak = WeakRouter(Arc::downgrade(&self.inner));
        let result = DRIVING
            .scope(self.id(), activation::activate(&definition, &params, &previous, &weak))
            .await;
        Ok((definition, result))
    }

    fn publish(&self, definition: &Arc<StateDefinition>, snapshot: ActiveStates, via: Via) -> Option<Arc<State>> {
        let snapshot = Arc::new(snapshot);
        let current = snapshot.current().cloned();

        let previous = self.inner.active_tx.send_replace(snapshot.clone());
        self.inner.state_tx.send_replace(current.clone());

        {
            let mut pointer = lock(&self.inner.current);
            pointer.definition = Some(definition.clone());
            pointer.params = snapshot.params().clone();
        }

        for state in previous.release_unless_held(&snapshot) {
            self.emit(RouterEvent::Destroyed { state });
        }

        info!(state = definition.name(), "state activated");

        let observers: Vec<Observer> = read(&self.inner.observers).clone();
        for observer in observers {
            observer(&snapshot);
        }

        self.emit(RouterEvent::Activated {
            state: definition.name().to_string(),
            params: snapshot.params().clone(),
        });

        if via == Via::Go {
            self.write_back(definition, snapshot.params());
        }

        current
    }

    fn emit(&self, event: RouterEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    // ------------------------------------------------------------------
    // Location binding
    // ------------------------------------------------------------------

    /// Links the router to an external location and routes its current value
    pub async fn link_with_location<L: Location + 'static>(&self, location: L) -> Navigation {
        let location: Arc<dyn Location> = Arc::new(location);
        *lock(&self.inner.location) = Some(location.clone());
        info!("router linked with location");

        let raw = location.current();
        self.location_changed(&raw).await
    }

    /// Listener entry point for external location changes
    ///
    /// A change written by the router itself is skipped once.
    pub async fn location_changed(&self, raw: &str) -> Navigation {
        if self.inner.triggered_change.swap(false, Ordering::SeqCst) {
            debug!(location = raw, "ignoring self-triggered location change");
            return Ok(self.current_state());
        }

        let config = &self.inner.config.location;
        let path = location_path(raw, &config.prefix, config.query_separator).to_string();
        self.set_url(&path).await
    }

    fn write_back(&self, definition: &StateDefinition, params: &Params) {
        let Some(location) = lock(&self.inner.location).clone() else {
            return;
        };

        if definition.is_virtual() {
            debug!(state = definition.name(), "virtual state, location left unchanged");
            return;
        }

        match definition.url(params) {
            Ok(url) => {
                let href = format!("{}{}", self.inner.config.location.prefix, url);
                if location.current() == href {
                    return;
                }
                self.inner.triggered_change.store(true, Ordering::SeqCst);
                info!(location = %href, "updating location");
                location.set(&href);
            }
            Err(err) => warn!(state = definition.name(), error = %err, "cannot build location url"),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("states", &self.state_names())
            .field("current", &self.current_state().map(|s| s.name().to_string()))
            .field("activating", &self.is_activating())
            .finish()
    }
}

fn count_redirect(redirects: &mut usize, limit: usize, from: &Target) -> Result<(), RouterError> {
    *redirects += 1;
    if *redirects > limit {
        warn!(state = %from.name, limit, "redirect limit exceeded");
        return Err(RouterError::RedirectLimit {
            limit,
            state: from.name.clone(),
        });
    }
    Ok(())
}

/// Releases the in-flight slot if the driving future is dropped early;
/// deferred callers get `Aborted`
struct FlightGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("activation dropped before settling");
            let waiters = lock(&self.inner.flight).abort();
            for waiter in waiters {
                let _ = waiter.send(Err(RouterError::Aborted));
            }
        }
    }
}
