use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

use crate::api::Wei;
use crate::rpc::Provider;

/// The wallet/provider collaborator: account access and balances. Keys and
/// signing live entirely on its side.
#[async_trait]
pub trait Wallet {
    /// Requests account access. The first account acts as the signer.
    async fn accounts(&self) -> Result<Vec<Address>>;
    async fn balance(&self, address: Address) -> Result<Wei>;
}

pub struct RpcWallet {
    provider: Arc<Provider>,
}

impl RpcWallet {
    pub fn new(provider: Arc<Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.provider.request_accounts().await?)
    }
    async fn balance(&self, address: Address) -> Result<Wei> {
        Ok(self.provider.balance(address).await?)
    }
}

#[derive(Debug, Default)]
pub struct TestWallet {
    accounts: Mutex<Vec<Address>>,
    balances: Mutex<HashMap<Address, Wei>>,
}

impl TestWallet {
    pub fn fund(&self, address: Address, amount: Wei) {
        let mut accounts = self.accounts.lock().unwrap();
        if !accounts.contains(&address) {
            accounts.push(address);
        }
        self.balances.lock().unwrap().insert(address, amount);
    }
}

#[async_trait]
impl Wallet for TestWallet {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.lock().unwrap().clone())
    }
    async fn balance(&self, address: Address) -> Result<Wei> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(Wei::ZERO))
    }
}
