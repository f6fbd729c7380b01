// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::network::{Ethereum, EthereumWallet};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;
use url::Url;

/// HTTP provider that signs with the managed account.
pub type HttpProvider = DynProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn parse_rpc_url(rpc_url: &str) -> Result<Url, AppError> {
        Url::parse(rpc_url.trim()).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))
    }

    pub fn signer(wallet_key: &str) -> Result<PrivateKeySigner, AppError> {
        PrivateKeySigner::from_str(wallet_key.trim())
            .map_err(|e| AppError::Config(format!("Invalid wallet key: {}", e)))
    }

    /// Fillers supply chain id and fees; nonce and gas limit are always set by the caller.
    pub fn http(rpc_url: &str, signer: PrivateKeySigner) -> Result<HttpProvider, AppError> {
        let url = Self::parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(provider)
    }
}
