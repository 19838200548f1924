//! # Device Identity
//!
//! The only notion of a session. A device is an opaque UUID v4 kept in the
//! `device_id` cookie and mapped 1:1 to a store file, nothing is kept
//! server-side.
//!
//! ## Cookies
//! - device_id: UUID v4 string lasting 1 year, refreshed on every successful response
//!
//! ## Flow
//! - Middleware reads the cookie, or mints a new id when there is none
//! - The resolved [`Device`] goes into the request extensions
//! - Handlers pick it up with [`KnownDevice`] (cookie required) or
//!   [`AnyDevice`] (fresh id accepted)
//! - On the way out, successful responses get the cookie (re)set
use axum::{
    extract::{FromRequestParts, Request},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const DEVICE_COOKIE: &str = "device_id";
pub const DEVICE_COOKIE_MAX_AGE: u64 = 60 * 60 * 24 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Anything that isn't a UUID is rejected, the id ends up in a file name.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim())
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn set_cookie(&self) -> String {
        format!(
            "{DEVICE_COOKIE}={}; Max-Age={DEVICE_COOKIE_MAX_AGE}; Path=/",
            self.0
        )
    }
}

#[derive(Debug, Clone)]
pub enum Device {
    Returning(DeviceId),
    Minted(DeviceId),
}

impl Device {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match device_cookie(headers) {
            Some(id) => Device::Returning(id),
            None => Device::Minted(DeviceId::mint()),
        }
    }

    pub fn id(&self) -> &DeviceId {
        match self {
            Device::Returning(id) | Device::Minted(id) => id,
        }
    }
}

pub fn device_cookie(headers: &HeaderMap) -> Option<DeviceId> {
    let raw = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == DEVICE_COOKIE)
        .map(|(_, value)| value)?;

    let id = DeviceId::parse(raw);
    if id.is_none() {
        warn!("Ignoring malformed {DEVICE_COOKIE} cookie");
    }

    id
}

pub async fn device_layer(mut request: Request, next: Next) -> Response {
    let device = Device::from_headers(request.headers());

    if let Device::Minted(id) = &device {
        debug!("No device cookie, minted {}", id.as_str());
    }

    request.extensions_mut().insert(device.clone());

    let mut response = next.run(request).await;

    if response.status().is_success() {
        if let Ok(value) = HeaderValue::from_str(&device.id().set_cookie()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn resolved(parts: &Parts) -> Device {
    parts
        .extensions
        .get::<Device>()
        .cloned()
        .unwrap_or_else(|| Device::from_headers(&parts.headers))
}

impl<S: Send + Sync> FromRequestParts<S> for Device {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(resolved(parts))
    }
}

/// A device that already carries the cookie.
pub struct KnownDevice(pub DeviceId);

impl<S: Send + Sync> FromRequestParts<S> for KnownDevice {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match resolved(parts) {
            Device::Returning(id) => Ok(KnownDevice(id)),
            Device::Minted(_) => Err(AppError::MissingDevice),
        }
    }
}

/// Either a returning device or the one minted for this request.
pub struct AnyDevice(pub DeviceId);

impl<S: Send + Sync> FromRequestParts<S> for AnyDevice {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AnyDevice(resolved(parts).id().clone()))
    }
}
