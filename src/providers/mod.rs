//! Read-only market data sources used to enrich trade events.

mod ads;
mod dextools;
mod honeypot;
mod json_value;
mod rpc;
pub mod traits;

pub use ads::RepositoryAdProvider;
pub use dextools::DextoolsPairInfoProvider;
pub use honeypot::HoneypotAssetInfoProvider;
pub use json_value::{value_to_decimal, value_to_u64};
pub use rpc::JsonRpcBalanceProvider;
pub use traits::{
    AdProvider, AssetInfo, AssetInfoProvider, BalanceProvider, PairInfoProvider, ProviderError,
};
