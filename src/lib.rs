mod client;

pub use studyhall_live_types as types;

pub use client::{connect, connect_with_config, Client, Config, LiveEvent, ServerRx, Stats};
