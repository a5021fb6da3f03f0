mod client;

pub use supplydrop_types as types;
pub use client::{
    connect, connect_with_config, Client, ClientTx, Config, ConfigBuilder, RealtimeClient,
    ServerRx, Stats,
};
