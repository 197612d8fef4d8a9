//! Runner engine: storage, timers, page loads and effect execution.
mod navigate;
mod persist;
mod session;
mod store;
mod timer;

pub use navigate::{
    NavigateError, NavigateFailure, NavigateSettings, Navigator, PageLoad, ReqwestNavigator,
};
pub use persist::{PersistError, StoreDocument};
pub use session::{Presenter, Session, SessionOutcome};
pub use store::{
    FileStore, KeyValueStore, MemoryStore, StoreChange, StoreError, StoreMap, Subscription,
    TieredStore,
};
pub use timer::{TimerEvent, TimerSet, COUNTDOWN_INTERVAL};
