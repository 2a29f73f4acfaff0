// SPDX-License-Identifier: Apache-2.0

//! Access-lattice and identity tests: capability implications, grant
//! enforcement, promote/demote disjointness, protected sends.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::Value;
use weft_core::{Envelope, Message as _, SharedMessage};
use weft_principals::{
    AccessError, AccessKind, CreatePrincipal, Identity, Kernel, Pkr, PrincipalKind,
    PrincipalRegistry, SendError, SendOptions,
};

#[derive(Default)]
struct RecordingKernel {
    sends: Mutex<Vec<(String, String, u32)>>,
}

impl Kernel for RecordingKernel {
    fn send_protected(
        &self,
        pkr: &Pkr,
        msg: SharedMessage,
        opts: &SendOptions,
    ) -> Result<(), SendError> {
        self.sends
            .lock()
            .push((pkr.uuid().to_owned(), msg.path().to_owned(), opts.priority));
        Ok(())
    }
}

struct Fixture {
    kernel_transport: Arc<RecordingKernel>,
    registry: PrincipalRegistry,
    kernel: Pkr,
    owner: Pkr,
    owner_identity: Identity,
    stranger: Pkr,
}

fn fixture() -> Fixture {
    let kernel_transport = Arc::new(RecordingKernel::default());
    let Ok(registry) = PrincipalRegistry::new(kernel_transport.clone()) else {
        unreachable!("registry construction must succeed")
    };
    let Some(kernel) = registry.kernel_pkr() else {
        unreachable!("kernel PKR must exist")
    };
    let Ok(owner) = registry.create_principal(PrincipalKind::TopLevel, CreatePrincipal::default())
    else {
        unreachable!("owner creation must succeed")
    };
    let Ok(owner_identity) = registry.create_identity(&owner) else {
        unreachable!("identity creation must succeed")
    };
    let Ok(stranger) =
        registry.create_principal(PrincipalKind::TopLevel, CreatePrincipal::default())
    else {
        unreachable!("stranger creation must succeed")
    };
    Fixture {
        kernel_transport,
        registry,
        kernel,
        owner,
        owner_identity,
        stranger,
    }
}

fn new_principal(registry: &PrincipalRegistry) -> Pkr {
    match registry.create_principal(PrincipalKind::TopLevel, CreatePrincipal::default()) {
        Ok(pkr) => pkr,
        Err(err) => unreachable!("principal creation must succeed: {err}"),
    }
}

#[test]
fn owner_and_kernel_hold_every_capability() {
    let fx = fixture();
    let rws = fx.owner_identity.rws().read();
    for pkr in [&fx.owner, &fx.kernel] {
        assert!(rws.can_read(pkr));
        assert!(rws.can_write(pkr));
        assert!(rws.can_grant(pkr));
    }
    assert!(!rws.can_read(&fx.stranger));
}

#[test]
fn readers_read_writers_write_nobody_else_grants() {
    let fx = fixture();
    let reader = new_principal(&fx.registry);
    let writer = new_principal(&fx.registry);
    {
        let mut rws = fx.owner_identity.rws().write();
        assert!(rws.add_reader(&fx.owner, &reader).is_ok());
        assert!(rws.add_writer(&fx.owner, &writer).is_ok());
    }
    let rws = fx.owner_identity.rws().read();

    assert!(rws.can_read(&reader));
    assert!(!rws.can_write(&reader));
    assert!(!rws.can_grant(&reader));

    assert!(rws.can_read(&writer), "writers implicitly read");
    assert!(rws.can_write(&writer));
    assert!(!rws.can_grant(&writer));
}

#[test]
fn grants_require_grant_capability() {
    let fx = fixture();
    let target = new_principal(&fx.registry);
    let mut rws = fx.owner_identity.rws().write();

    let refused = rws.add_reader(&fx.stranger, &target);
    assert!(matches!(refused, Err(AccessError::Unauthorized { .. })));
    assert!(rws.add_reader(&fx.kernel, &target).is_ok(), "kernel may always grant");
}

#[test]
fn promote_and_demote_keep_sets_disjoint() {
    let fx = fixture();
    let member = new_principal(&fx.registry);
    let mut rws = fx.owner_identity.rws().write();

    assert!(rws.add_reader(&fx.owner, &member).is_ok());
    assert!(matches!(rws.promote(&fx.owner, &member), Ok(true)));
    assert!(rws.writers().contains(&member.uuid().to_owned()));
    assert!(!rws.readers().contains(&member.uuid().to_owned()));

    assert!(matches!(rws.demote(&fx.owner, &member), Ok(true)));
    assert!(rws.readers().contains(&member.uuid().to_owned()));
    assert!(!rws.writers().contains(&member.uuid().to_owned()));

    // Promoting a non-reader moves nothing.
    assert!(matches!(rws.promote(&fx.owner, &fx.stranger), Ok(false)));
}

#[test]
fn cloned_sets_diverge_independently() {
    let fx = fixture();
    let member = new_principal(&fx.registry);
    let mut original = fx.owner_identity.rws().write();
    let mut copy = original.clone_set();

    assert!(copy.add_reader(&fx.owner, &member).is_ok());
    assert!(copy.can_read(&member));
    assert!(!original.can_read(&member), "the original must not see the copy's grant");

    assert!(original.add_writer(&fx.owner, &member).is_ok());
    assert!(!copy.can_write(&member), "the copy must not see the original's grant");
}

#[test]
fn require_wrappers_gate_handler_invocation() {
    let fx = fixture();
    let reader = new_principal(&fx.registry);
    assert!(fx.owner_identity.grant_reader(&reader).is_ok());

    let granted = fx.owner_identity.require_read(&reader, || "ran");
    assert!(matches!(granted, Ok("ran")));

    let refused = fx.owner_identity.require_write(&reader, || "ran");
    assert!(matches!(refused, Err(AccessError::Unauthorized { .. })));

    let via_auth = fx.owner_identity.require_auth(AccessKind::Grant, &fx.owner, || 7);
    assert!(matches!(via_auth, Ok(7)));
}

#[test]
fn send_protected_forwards_under_the_owner_pkr() {
    let fx = fixture();
    let msg = Envelope::new("secure/channel", Value::Null).shared();
    let opts = SendOptions {
        priority: 3,
        atomic: false,
    };
    assert!(fx.owner_identity.send_protected(msg, &opts).is_ok());

    let sends = fx.kernel_transport.sends.lock();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].0, fx.owner.uuid());
    assert_eq!(sends[0].1, "secure/channel");
    assert_eq!(sends[0].2, 3);
}

#[test]
fn send_protected_fails_without_a_kernel() {
    let fx = fixture();
    assert!(fx.registry.delete(fx.kernel.uuid()).is_ok());

    let msg = Envelope::new("secure/channel", Value::Null).shared();
    let result = fx.owner_identity.send_protected(msg, &SendOptions::default());
    assert!(matches!(result, Err(AccessError::KernelAbsent)));
}

proptest! {
    // For any membership assignment, the capability lattice is monotone:
    // grant implies write implies read.
    #[test]
    fn capability_lattice_is_monotone(is_reader in any::<bool>(), is_writer in any::<bool>()) {
        let fx = fixture();
        let member = new_principal(&fx.registry);
        {
            let mut rws = fx.owner_identity.rws().write();
            if is_reader {
                prop_assert!(rws.add_reader(&fx.owner, &member).is_ok());
            }
            if is_writer {
                prop_assert!(rws.add_writer(&fx.owner, &member).is_ok());
            }
        }
        let rws = fx.owner_identity.rws().read();
        for pkr in [&fx.kernel, &fx.owner, &member, &fx.stranger] {
            prop_assert!(!rws.can_write(pkr) || rws.can_read(pkr), "write ⇒ read");
            prop_assert!(!rws.can_grant(pkr) || rws.can_write(pkr), "grant ⇒ write");
        }
    }
}
