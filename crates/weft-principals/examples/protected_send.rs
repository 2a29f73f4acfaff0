// SPDX-License-Identifier: Apache-2.0
//! Mints principals, grants capabilities, and sends a protected message
//! through a toy kernel transport.
//!
//! Run with `cargo run --example protected_send`.
#![allow(clippy::print_stdout)]

use std::sync::Arc;

use serde_json::{json, Value};
use weft_core::{Envelope, Message as _, SharedMessage};
use weft_principals::{
    CreatePrincipal, Kernel, Pkr, PrincipalKind, PrincipalRegistry, SendError, SendOptions,
};

struct StdoutKernel;

impl Kernel for StdoutKernel {
    fn send_protected(
        &self,
        pkr: &Pkr,
        msg: SharedMessage,
        opts: &SendOptions,
    ) -> Result<(), SendError> {
        println!(
            "kernel send: principal={} path={} priority={}",
            pkr.uuid(),
            msg.path(),
            opts.priority
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = PrincipalRegistry::new(Arc::new(StdoutKernel))?;

    let owner = registry.create_principal(
        PrincipalKind::TopLevel,
        CreatePrincipal {
            name: Some("app".to_owned()),
            metadata: json!({ "role": "demo" }),
            ..CreatePrincipal::default()
        },
    )?;
    let identity = registry.create_identity(&owner)?;

    let friend = registry.create_principal(
        PrincipalKind::Friend,
        CreatePrincipal {
            name: Some("partner".to_owned()),
            ..CreatePrincipal::default()
        },
    )?;
    identity.grant_reader(&friend)?;

    match identity.require_read(&friend, || "friend read allowed") {
        Ok(verdict) => println!("{verdict}"),
        Err(err) => println!("unexpected refusal: {err}"),
    }
    if let Err(err) = identity.require_write(&friend, || ()) {
        println!("expected refusal: {err}");
    }

    identity.send_protected(
        Envelope::new("audit/log", Value::Null).shared(),
        &SendOptions {
            priority: 2,
            atomic: false,
        },
    )?;

    println!("owner PKR: {}", identity.pkr()?.to_json());
    Ok(())
}
