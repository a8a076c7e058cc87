//! UE context arena

use std::collections::{BTreeMap, HashMap};

use nextgamf_common::{Guami, Guti, Supi};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AmfUeNgapId, RanUeNgapId, UeContext};

/// Identifier allocators, persisted as one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generators {
    pub next_amf_ue_ngap_id: AmfUeNgapId,
    pub next_tmsi: u32,
    /// Last GUTI assigned to each subscriber
    pub guti_by_supi: BTreeMap<Supi, Guti>,
}

impl Default for Generators {
    fn default() -> Self {
        Self {
            next_amf_ue_ngap_id: 1,
            next_tmsi: 1,
            guti_by_supi: BTreeMap::new(),
        }
    }
}

/// Outcome of [`UeContextStore::bind_supi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupiBinding {
    /// No other context held the SUPI
    Bound,
    /// Taken over from this older context, which the caller must release
    Displaced(AmfUeNgapId),
    /// This newer context keeps the SUPI and nothing changed
    Superseded(AmfUeNgapId),
}

/// All UE contexts, owned by the AMF task.
#[derive(Debug, Default)]
pub struct UeContextStore {
    contexts: HashMap<AmfUeNgapId, UeContext>,
    by_supi: HashMap<Supi, AmfUeNgapId>,
    by_tmsi: HashMap<u32, AmfUeNgapId>,
    generators: Generators,
}

impl UeContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from persisted records.
    ///
    /// If two records claim the same SUPI the one with the higher AMF UE NGAP
    /// id (the newer association) wins. Generators are advanced past every
    /// restored identifier.
    pub fn from_restored(contexts: Vec<UeContext>, generators: Option<Generators>) -> Self {
        let mut store = Self {
            generators: generators.unwrap_or_default(),
            ..Self::default()
        };
        let mut contexts = contexts;
        contexts.sort_by_key(|ue| ue.amf_ue_ngap_id);
        for ue in contexts {
            let id = ue.amf_ue_ngap_id;
            if let Some(supi) = ue.supi.clone() {
                if let Some(older) = store.by_supi.insert(supi.clone(), id) {
                    warn!(%supi, older, newer = id, "Two restored contexts share a SUPI, keeping the newer");
                    store.remove(older);
                    store.by_supi.insert(supi, id);
                }
            }
            if let Some(guti) = ue.guti {
                store.by_tmsi.insert(guti.tmsi, id);
                store.generators.next_tmsi = store.generators.next_tmsi.max(guti.tmsi.wrapping_add(1));
            }
            store.generators.next_amf_ue_ngap_id = store.generators.next_amf_ue_ngap_id.max(id + 1);
            store.contexts.insert(id, ue);
        }
        store
    }

    /// Allocates an AMF UE NGAP id not bound to any context.
    pub fn allocate_amf_ue_ngap_id(&mut self) -> AmfUeNgapId {
        loop {
            let id = self.generators.next_amf_ue_ngap_id;
            self.generators.next_amf_ue_ngap_id = id.wrapping_add(1).max(1);
            if id != 0 && !self.contexts.contains_key(&id) {
                return id;
            }
        }
    }

    /// Creates an empty context for a new radio association.
    pub fn create(&mut self, ran_ue_ngap_id: RanUeNgapId) -> AmfUeNgapId {
        let id = self.allocate_amf_ue_ngap_id();
        self.contexts.insert(id, UeContext::new(id, ran_ue_ngap_id));
        debug!(amf_ue_ngap_id = id, ran_ue_ngap_id, "UE context created");
        id
    }

    pub fn get(&self, id: AmfUeNgapId) -> Option<&UeContext> {
        self.contexts.get(&id)
    }

    pub fn get_mut(&mut self, id: AmfUeNgapId) -> Option<&mut UeContext> {
        self.contexts.get_mut(&id)
    }

    pub fn contains(&self, id: AmfUeNgapId) -> bool {
        self.contexts.contains_key(&id)
    }

    pub fn find_by_supi(&self, supi: &Supi) -> Option<AmfUeNgapId> {
        self.by_supi.get(supi).copied()
    }

    pub fn find_by_tmsi(&self, tmsi: u32) -> Option<AmfUeNgapId> {
        self.by_tmsi.get(&tmsi).copied()
    }

    /// Context whose current GUTI equals `guti`.
    pub fn find_by_guti(&self, guti: &Guti) -> Option<AmfUeNgapId> {
        let id = self.find_by_tmsi(guti.tmsi)?;
        let ue = self.contexts.get(&id)?;
        (ue.guti.as_ref() == Some(guti)).then_some(id)
    }

    /// Binds `supi` to context `id`, the newer association winning.
    ///
    /// AMF UE NGAP ids grow with every new association, so of two contexts
    /// claiming one SUPI the higher id is the newer one, as in
    /// [`UeContextStore::from_restored`]. Returns `None` if `id` is unknown.
    pub fn bind_supi(&mut self, id: AmfUeNgapId, supi: Supi) -> Option<SupiBinding> {
        if !self.contexts.contains_key(&id) {
            return None;
        }
        if let Some(holder) = self.find_by_supi(&supi).filter(|holder| *holder > id) {
            return Some(SupiBinding::Superseded(holder));
        }
        let ue = self.contexts.get_mut(&id)?;
        if let Some(old) = ue.supi.replace(supi.clone()) {
            if old != supi && self.by_supi.get(&old) == Some(&id) {
                self.by_supi.remove(&old);
            }
        }
        Some(match self.by_supi.insert(supi, id).filter(|previous| *previous != id) {
            Some(previous) => SupiBinding::Displaced(previous),
            None => SupiBinding::Bound,
        })
    }

    /// Assigns a fresh 5G-GUTI under `guami` to context `id`.
    pub fn assign_guti(&mut self, id: AmfUeNgapId, guami: Guami) -> Option<Guti> {
        if !self.contexts.contains_key(&id) {
            return None;
        }
        let tmsi = self.allocate_tmsi();
        let ue = self.contexts.get_mut(&id)?;
        if let Some(old) = ue.guti.take() {
            if self.by_tmsi.get(&old.tmsi) == Some(&id) {
                self.by_tmsi.remove(&old.tmsi);
            }
        }
        let guti = Guti::new(guami, tmsi);
        ue.guti = Some(guti);
        self.by_tmsi.insert(tmsi, id);
        if let Some(supi) = ue.supi.clone() {
            self.generators.guti_by_supi.insert(supi, guti);
        }
        Some(guti)
    }

    fn allocate_tmsi(&mut self) -> u32 {
        loop {
            let tmsi = self.generators.next_tmsi;
            self.generators.next_tmsi = tmsi.wrapping_add(1);
            if tmsi != 0 && !self.by_tmsi.contains_key(&tmsi) {
                return tmsi;
            }
        }
    }

    /// Deletes a context, freeing its SUPI binding and GUTI.
    pub fn remove(&mut self, id: AmfUeNgapId) -> Option<UeContext> {
        let ue = self.contexts.remove(&id)?;
        if let Some(supi) = &ue.supi {
            if self.by_supi.get(supi) == Some(&id) {
                self.by_supi.remove(supi);
            }
            if ue.guti.is_some() && self.generators.guti_by_supi.get(supi) == ue.guti.as_ref() {
                self.generators.guti_by_supi.remove(supi);
            }
        }
        if let Some(guti) = &ue.guti {
            if self.by_tmsi.get(&guti.tmsi) == Some(&id) {
                self.by_tmsi.remove(&guti.tmsi);
            }
        }
        debug!(amf_ue_ngap_id = id, "UE context deleted");
        Some(ue)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn ids(&self) -> Vec<AmfUeNgapId> {
        let mut ids: Vec<AmfUeNgapId> = self.contexts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &UeContext> {
        self.contexts.values()
    }

    pub fn generators(&self) -> &Generators {
        &self.generators
    }
}
