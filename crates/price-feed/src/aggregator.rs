//! DEX aggregator client
//!
//! Signed endpoints (quote, supported chains, token list) and the public
//! quote-compare endpoint used for per-token unit prices. Responses come in a
//! `{ code, msg, data }` envelope where `code == "0"` means success.

use alloy_primitives::{hex, Address, U256};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use ngo_core::{
    usdc_address, AggregatorSettings, AggregatorToken, ChainId, DexRoute, PriceFeedError,
    PriceFeedResult, QuoteRequest, RouteToken, SupportedChain, SwapQuote,
};

use crate::signing::RequestSigner;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

pub const QUOTE_PATH: &str = "/api/v5/dex/aggregator/quote";
pub const SUPPORTED_CHAIN_PATH: &str = "/api/v5/dex/aggregator/supported/chain";
pub const ALL_TOKENS_PATH: &str = "/api/v5/dex/aggregator/all-tokens";
pub const PUBLIC_QUOTE_PATH: &str = "/aggregator/quote";

/// Provider code for "too many requests"
pub const RATE_LIMIT_CODE: &str = "50011";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: serde_json::Value,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuoteData {
    #[serde(default)]
    dex_router_list: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoute {
    #[serde(default)]
    router: String,
    #[serde(default)]
    router_name: String,
    from_token: RawToken,
    to_token: RawToken,
    from_token_amount: String,
    to_token_amount: String,
    #[serde(default)]
    trade_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToken {
    token_contract_address: String,
    #[serde(default)]
    token_symbol: String,
    #[serde(default)]
    token_name: String,
    #[serde(default)]
    token_unit_price: Option<String>,
}

impl RawToken {
    fn into_route_token(self) -> PriceFeedResult<RouteToken> {
        let address = Address::from_str(&self.token_contract_address).map_err(|e| {
            PriceFeedError::Malformed(format!(
                "bad token address {}: {}",
                self.token_contract_address, e
            ))
        })?;

        Ok(RouteToken {
            address,
            symbol: self.token_symbol,
            name: self.token_name,
            unit_price: self
                .token_unit_price
                .as_deref()
                .and_then(|p| Decimal::from_str(p.trim()).ok()),
        })
    }
}

impl RawRoute {
    fn into_route(self) -> PriceFeedResult<DexRoute> {
        Ok(DexRoute {
            router: self.router,
            router_name: self.router_name,
            from_token: self.from_token.into_route_token()?,
            to_token: self.to_token.into_route_token()?,
            from_token_amount: parse_amount(&self.from_token_amount)?,
            to_token_amount: parse_amount(&self.to_token_amount)?,
            trade_fee: self
                .trade_fee
                .as_deref()
                .map(|fee| fee.trim().trim_end_matches('%'))
                .and_then(|fee| Decimal::from_str(fee).ok())
                .unwrap_or(Decimal::ZERO),
        })
    }
}

fn parse_amount(raw: &str) -> PriceFeedResult<U256> {
    U256::from_str(raw.trim())
        .map_err(|e| PriceFeedError::Malformed(format!("bad amount {:?}: {}", raw, e)))
}

fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// `{base_url}{path}` with form-encoded query parameters, in parameter order
pub fn build_url(base_url: &str, path: &str, params: &[(&str, String)]) -> PriceFeedResult<Url> {
    let raw = format!("{}{}", base_url, path);
    let url = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params.iter().map(|(key, value)| (*key, value.as_str())))
    };

    url.map_err(|e| PriceFeedError::InvalidRequest(format!("bad URL {}: {}", raw, e)))
}

/// Path and query as sent on the wire; this is what the signature covers
pub fn request_path(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    }
}

fn quote_params(chain: ChainId, from: &Address, to: &Address, amount: U256) -> Vec<(&'static str, String)> {
    vec![
        ("chainId", chain.id().to_string()),
        ("fromTokenAddress", format_address(from)),
        ("toTokenAddress", format_address(to)),
        ("amount", amount.to_string()),
    ]
}

fn decode_envelope<T: DeserializeOwned>(response: HttpResponse, signed: bool) -> PriceFeedResult<Vec<T>> {
    match response.status {
        429 => return Err(PriceFeedError::RateLimited),
        status @ 400..=499 if signed => return Err(PriceFeedError::Unauthorized { status }),
        status if !response.is_success() => {
            return Err(PriceFeedError::Http {
                status,
                body: response.body.chars().take(200).collect(),
            })
        }
        _ => {}
    }

    let envelope: Envelope<T> = response.json()?;
    let code = match &envelope.code {
        serde_json::Value::String(code) => code.clone(),
        other => other.to_string(),
    };

    match code.as_str() {
        "0" => Ok(envelope.data),
        RATE_LIMIT_CODE => Err(PriceFeedError::RateLimited),
        _ => Err(PriceFeedError::Upstream { code, msg: envelope.msg }),
    }
}

fn into_swap_quote(chain: ChainId, data: Vec<RawQuoteData>) -> PriceFeedResult<SwapQuote> {
    let routes = data
        .into_iter()
        .flat_map(|d| d.dex_router_list)
        .map(RawRoute::into_route)
        .collect::<PriceFeedResult<Vec<_>>>()?;

    if routes.is_empty() {
        return Err(PriceFeedError::Malformed("quote response has no routes".to_string()));
    }

    Ok(SwapQuote { chain, routes })
}

/// Aggregator API client
pub struct AggregatorClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    signer: Option<RequestSigner>,
    request_timeout: Duration,
    public_timeout: Duration,
}

impl AggregatorClient {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: &AggregatorSettings) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            signer: settings.usable_credentials().cloned().map(RequestSigner::new),
            request_timeout: settings.request_timeout(),
            public_timeout: settings.public_timeout(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    pub fn key_hint(&self) -> Option<String> {
        self.signer.as_ref().map(|s| s.key_hint())
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> PriceFeedResult<Vec<T>> {
        let signer = self.signer.as_ref().ok_or(PriceFeedError::MissingCredentials)?;

        let url = build_url(&self.base_url, path, params)?;
        let headers = signer.headers(HttpMethod::Get.as_str(), &request_path(&url), "")?;

        debug!("Signed GET {}", url);

        let request = HttpRequest::get(url.as_str(), self.request_timeout).with_headers(headers);
        let response = self.transport.send(request).await?;

        decode_envelope(response, true)
    }

    /// Authenticated swap quote
    pub async fn quote(&self, request: &QuoteRequest) -> PriceFeedResult<SwapQuote> {
        let mut params = quote_params(request.chain, &request.from_token, &request.to_token, request.amount);
        params.push(("slippage", request.slippage.to_string()));

        let data: Vec<RawQuoteData> = self.signed_get(QUOTE_PATH, &params).await?;
        into_swap_quote(request.chain, data)
    }

    pub async fn supported_chains(&self) -> PriceFeedResult<Vec<SupportedChain>> {
        self.signed_get(SUPPORTED_CHAIN_PATH, &[]).await
    }

    pub async fn all_tokens(&self, chain: ChainId) -> PriceFeedResult<Vec<AggregatorToken>> {
        self.signed_get(ALL_TOKENS_PATH, &[("chainId", chain.id().to_string())])
            .await
    }

    /// Unit price of `token` quoted against the chain's USDC via the public
    /// quote-compare endpoint; `None` when no route reports a price
    pub async fn token_unit_price(
        &self,
        token: Address,
        chain: ChainId,
        amount: U256,
    ) -> PriceFeedResult<Option<Decimal>> {
        let params = quote_params(chain, &token, &usdc_address(chain), amount);
        let url = build_url(&self.base_url, PUBLIC_QUOTE_PATH, &params)?;

        let response = self
            .transport
            .send(HttpRequest::get(url.as_str(), self.public_timeout))
            .await?;

        let data: Vec<RawQuoteData> = decode_envelope(response, false)?;
        let price = data
            .into_iter()
            .flat_map(|d| d.dex_router_list)
            .next()
            .and_then(|route| route.from_token.token_unit_price)
            .and_then(|p| Decimal::from_str(p.trim()).ok());

        Ok(price)
    }
}
