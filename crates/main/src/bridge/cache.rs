////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    any::TypeId,
    cell::{Cell, RefCell},
    rc::Rc,
};

use ahash::AHashMap;
use log::trace;

use crate::{
    host::{HostObject, Realm, WeakHostObject},
    runtime::BridgeResult,
};

/// The identity of an addressable compiled value.
///
/// The type component distinguishes a record from its first field, which
/// share the same address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MirrorKey {
    pub(crate) address: usize,
    pub(crate) ty: TypeId,
}

/// A cache of live mirrors keyed by the identity of the compiled values they
/// represent.
///
/// The cache does not keep the mirrors alive. An entry is evicted by the host
/// finalizer of its mirror, and only if the entry still belongs to that
/// mirror: a newer mirror for a reused address survives a late finalizer.
pub(crate) struct IdentityCache {
    entries: RefCell<AHashMap<MirrorKey, CacheEntry>>,
    generation: Cell<u64>,
}

struct CacheEntry {
    mirror: WeakHostObject,
    generation: u64,
}

impl IdentityCache {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(AHashMap::new()),
            generation: Cell::new(0),
        }
    }

    /// Returns the live mirror for `key`, or builds, registers and returns a
    /// new one.
    pub(crate) fn fetch(
        self: &Rc<Self>,
        realm: &Realm,
        key: MirrorKey,
        build: impl FnOnce() -> BridgeResult<HostObject>,
    ) -> BridgeResult<HostObject> {
        if let Some(mirror) = self.lookup(&key) {
            trace!("Mirror cache hit at {:#x}.", key.address);

            return Ok(mirror);
        }

        let mirror = build()?;

        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);

        let _ = self.entries.borrow_mut().insert(
            key,
            CacheEntry {
                mirror: mirror.downgrade(),
                generation,
            },
        );

        let cache = Rc::downgrade(self);

        realm.register_finalizer(&mirror, move || {
            if let Some(cache) = cache.upgrade() {
                cache.evict(&key, generation);
            }
        });

        Ok(mirror)
    }

    /// Returns the number of registered entries, including the entries whose
    /// mirrors are unreachable but not finalized yet.
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn lookup(&self, key: &MirrorKey) -> Option<HostObject> {
        self.entries.borrow().get(key)?.mirror.upgrade()
    }

    fn evict(&self, key: &MirrorKey, generation: u64) {
        let mut entries = self.entries.borrow_mut();

        let Some(entry) = entries.get(key) else {
            return;
        };

        if entry.generation != generation {
            trace!("Skipping stale eviction at {:#x}.", key.address);
            return;
        }

        let _ = entries.remove(key);

        trace!("Mirror evicted at {:#x}.", key.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(address: usize) -> MirrorKey {
        MirrorKey {
            address,
            ty: TypeId::of::<u8>(),
        }
    }

    #[test]
    fn test_fetch_and_evict() {
        let realm = Realm::new();
        let cache = Rc::new(IdentityCache::new());

        let first = cache.fetch(&realm, key(1), || Ok(realm.new_object())).unwrap();
        let second = cache
            .fetch(&realm, key(1), || panic!("the live mirror was rebuilt"))
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(cache.len(), 1);

        drop(first);
        drop(second);
        realm.run_until_idle();

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_stale_finalizer() {
        let realm = Realm::new();
        let cache = Rc::new(IdentityCache::new());

        let old = cache.fetch(&realm, key(7), || Ok(realm.new_object())).unwrap();
        drop(old);

        // The old mirror is unreachable, but its finalizer has not run yet.
        let new = cache.fetch(&realm, key(7), || Ok(realm.new_object())).unwrap();

        realm.run_until_idle();

        assert_eq!(cache.len(), 1);
        assert!(cache
            .fetch(&realm, key(7), || panic!("the newer mirror was evicted"))
            .unwrap()
            .ptr_eq(&new));
    }
}
