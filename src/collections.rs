//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;

use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::error::Error;
use crate::interface::Interface;
use crate::lsdb::LsaEntry;
use crate::neighbor::{Neighbor, NeighborNetId};
use crate::packet::lsa::{Lsa, LsaKey, LsaType};

pub type ObjectId = u32;

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum ObjectKey<T> {
    Id(ObjectId),
    Value(T),
}

pub type AreaId = ObjectId;
pub type AreaIndex = Index;
pub type AreaKey = ObjectKey<Ipv4Addr>;
pub type InterfaceId = ObjectId;
pub type InterfaceIndex = Index;
pub type InterfaceKey = ObjectKey<String>;
pub type NeighborId = ObjectId;
pub type NeighborIndex = Index;
pub type NeighborKey = ObjectKey<Ipv4Addr>;
pub type LsaEntryId = ObjectId;
pub type LsaEntryIndex = Index;

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

#[derive(Debug, Default)]
pub struct Areas {
    arena: Arena<Area>,
    id_tree: HashMap<AreaId, AreaIndex>,
    area_id_tree: BTreeMap<Ipv4Addr, AreaIndex>,
    next_id: AreaId,
}

#[derive(Debug, Default)]
pub struct Interfaces {
    id_tree: HashMap<InterfaceId, InterfaceIndex>,
    name_tree: BTreeMap<String, InterfaceIndex>,
    next_id: InterfaceId,
}

#[derive(Debug, Default)]
pub struct Neighbors {
    id_tree: HashMap<NeighborId, NeighborIndex>,
    router_id_tree: BTreeMap<Ipv4Addr, NeighborIndex>,
    net_id_tree: BTreeMap<NeighborNetId, NeighborIndex>,
    next_id: NeighborId,
}

#[derive(Debug, Default)]
pub struct Lsdb {
    id_tree: HashMap<LsaEntryId, LsaEntryIndex>,
    tree: BTreeMap<LsaType, BTreeMap<LsaKey, LsaEntryIndex>>,
    next_id: LsaEntryId,
}

// LSDB ID.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsdbId {
    Link(AreaId, InterfaceId),
    Area(AreaId),
    As,
}

// LSDB Index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LsdbIndex {
    Link(AreaIndex, InterfaceIndex),
    Area(AreaIndex),
    As,
}

// LSDB key.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum LsdbKey {
    Link(AreaKey, InterfaceKey),
    Area(AreaKey),
    As,
}

// ===== impl ObjectKey =====

impl<T> From<ObjectId> for ObjectKey<T> {
    fn from(id: ObjectId) -> ObjectKey<T> {
        ObjectKey::Id(id)
    }
}

// ===== impl Arena =====

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}

// ===== impl Areas =====

impl Areas {
    pub fn insert(&mut self, area_id: Ipv4Addr) -> (AreaIndex, &mut Area) {
        // Create and insert area into the arena.
        self.next_id += 1;
        let area = Area::new(self.next_id, area_id);
        let area_idx = self.arena.0.insert(area);

        // Link area to different collections.
        let area = &mut self.arena[area_idx];
        self.id_tree.insert(area.id, area_idx);
        if self.area_id_tree.insert(area.area_id, area_idx).is_some() {
            panic!("area area-id={} already exists", area.area_id);
        }

        (area_idx, area)
    }

    pub fn delete(&mut self, area_idx: AreaIndex) {
        let area = &mut self.arena[area_idx];

        // Unlink area from different collections.
        self.id_tree.remove(&area.id);
        self.area_id_tree.remove(&area.area_id);

        // Remove area from the arena.
        self.arena.0.remove(area_idx);
    }

    // Returns a reference to the area corresponding to the given ID.
    pub fn get_by_id(
        &self,
        id: AreaId,
    ) -> Result<(AreaIndex, &Area), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|area_idx| (area_idx, &self.arena[area_idx]))
            .filter(|(_, area)| area.id == id)
            .ok_or(Error::AreaIdNotFound(id))
    }

    // Returns a mutable reference to the area corresponding to the given ID.
    pub fn get_mut_by_id(
        &mut self,
        id: AreaId,
    ) -> Result<(AreaIndex, &mut Area), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |area_idx| (area_idx, &mut self.arena[area_idx]))
            .filter(|(_, area)| area.id == id)
            .ok_or(Error::AreaIdNotFound(id))
    }

    // Returns a reference to the area corresponding to the given area ID.
    pub fn get_by_area_id(
        &self,
        area_id: Ipv4Addr,
    ) -> Option<(AreaIndex, &Area)> {
        self.area_id_tree
            .get(&area_id)
            .copied()
            .map(|area_idx| (area_idx, &self.arena[area_idx]))
    }

    // Returns a reference to the area corresponding to the given object key.
    pub fn get_by_key(
        &self,
        key: &AreaKey,
    ) -> Result<(AreaIndex, &Area), Error> {
        match key {
            AreaKey::Id(id) => self.get_by_id(*id),
            AreaKey::Value(area_id) => {
                Ok(self.get_by_area_id(*area_id).unwrap())
            }
        }
    }

    // Returns a mutable reference to the area corresponding to the given
    // object key.
    pub fn get_mut_by_key(
        &mut self,
        key: &AreaKey,
    ) -> Result<(AreaIndex, &mut Area), Error> {
        match key {
            AreaKey::Id(id) => self.get_mut_by_id(*id),
            AreaKey::Value(area_id) => {
                let area_idx = *self.area_id_tree.get(area_id).unwrap();
                Ok((area_idx, &mut self.arena[area_idx]))
            }
        }
    }

    // Returns an iterator visiting all areas.
    //
    // Areas are ordered by their area IDs.
    pub fn iter(&self) -> impl Iterator<Item = &Area> {
        self.area_id_tree
            .values()
            .map(|area_idx| &self.arena[*area_idx])
    }

    // Returns an iterator over all area indexes.
    //
    // Areas are ordered by their area IDs.
    pub fn indexes(&self) -> impl Iterator<Item = AreaIndex> + '_ {
        self.area_id_tree.values().copied()
    }
}

impl std::ops::Index<AreaIndex> for Areas {
    type Output = Area;

    fn index(&self, index: AreaIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<AreaIndex> for Areas {
    fn index_mut(&mut self, index: AreaIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    pub fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Interface>,
        ifname: &str,
    ) -> (InterfaceIndex, &'a mut Interface) {
        // Create and insert interface into the arena.
        self.next_id += 1;
        let iface = Interface::new(self.next_id, ifname.to_owned());
        let iface_idx = arena.0.insert(iface);

        // Link interface to different collections.
        let iface = &mut arena[iface_idx];
        self.id_tree.insert(iface.id, iface_idx);
        if self
            .name_tree
            .insert(iface.name.clone(), iface_idx)
            .is_some()
        {
            panic!("interface name={} already exists", iface.name);
        }

        (iface_idx, iface)
    }

    pub fn delete(
        &mut self,
        arena: &mut Arena<Interface>,
        iface_idx: InterfaceIndex,
    ) {
        let iface = &mut arena[iface_idx];

        // Unlink interface from different collections.
        self.id_tree.remove(&iface.id);
        self.name_tree.remove(&iface.name);

        // Remove interface from the arena.
        arena.0.remove(iface_idx);
    }

    // Returns a reference to the interface corresponding to the given ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<Interface>,
        id: InterfaceId,
    ) -> Result<(InterfaceIndex, &'a Interface), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|iface_idx| (iface_idx, &arena[iface_idx]))
            .filter(|(_, iface)| iface.id == id)
            .ok_or(Error::InterfaceIdNotFound(id))
    }

    // Returns a mutable reference to the interface corresponding to the given
    // ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Interface>,
        id: InterfaceId,
    ) -> Result<(InterfaceIndex, &'a mut Interface), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |iface_idx| (iface_idx, &mut arena[iface_idx]))
            .filter(|(_, iface)| iface.id == id)
            .ok_or(Error::InterfaceIdNotFound(id))
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn get_by_name<'a>(
        &self,
        arena: &'a Arena<Interface>,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &'a Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| (iface_idx, &arena[iface_idx]))
    }

    // Returns a reference to the interface corresponding to the given object
    // key.
    pub fn get_by_key<'a>(
        &self,
        arena: &'a Arena<Interface>,
        key: &InterfaceKey,
    ) -> Result<(InterfaceIndex, &'a Interface), Error> {
        match key {
            InterfaceKey::Id(id) => self.get_by_id(arena, *id),
            InterfaceKey::Value(ifname) => {
                Ok(self.get_by_name(arena, ifname).unwrap())
            }
        }
    }

    // Returns a mutable reference to the interface corresponding to the given
    // object key.
    pub fn get_mut_by_key<'a>(
        &mut self,
        arena: &'a mut Arena<Interface>,
        key: &InterfaceKey,
    ) -> Result<(InterfaceIndex, &'a mut Interface), Error> {
        match key {
            InterfaceKey::Id(id) => self.get_mut_by_id(arena, *id),
            InterfaceKey::Value(ifname) => {
                let iface_idx = *self.name_tree.get(ifname).unwrap();
                Ok((iface_idx, &mut arena[iface_idx]))
            }
        }
    }

    // Returns an iterator visiting all interfaces.
    //
    // Interfaces are ordered by their names.
    pub fn iter<'a>(
        &'a self,
        arena: &'a Arena<Interface>,
    ) -> impl Iterator<Item = &'a Interface> + 'a {
        self.name_tree.values().map(|iface_idx| &arena[*iface_idx])
    }

    // Returns an iterator over all interface indexes.
    //
    // Interfaces are ordered by their names.
    pub fn indexes(&self) -> impl Iterator<Item = InterfaceIndex> + '_ {
        self.name_tree.values().copied()
    }
}

// ===== impl Neighbors =====

impl Neighbors {
    pub fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> (NeighborIndex, &'a mut Neighbor) {
        // Create and insert neighbor into the arena.
        self.next_id += 1;
        let nbr = Neighbor::new(self.next_id, router_id, src);
        let nbr_idx = arena.0.insert(nbr);

        // Link neighbor to different collections.
        let nbr = &mut arena[nbr_idx];
        self.id_tree.insert(nbr.id, nbr_idx);
        self.router_id_tree.insert(nbr.router_id, nbr_idx);
        if self.net_id_tree.insert(nbr.network_id(), nbr_idx).is_some() {
            panic!("neighbor source={} already exists", nbr.src);
        }

        (nbr_idx, nbr)
    }

    pub fn delete(
        &mut self,
        arena: &mut Arena<Neighbor>,
        nbr_idx: NeighborIndex,
    ) {
        let nbr = &mut arena[nbr_idx];

        // Unlink neighbor from different collections.
        self.id_tree.remove(&nbr.id);
        self.router_id_tree.remove(&nbr.router_id);
        self.net_id_tree.remove(&nbr.network_id());

        // Remove neighbor from the arena.
        arena.0.remove(nbr_idx);
    }

    // Returns a reference to the neighbor corresponding to the given ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|nbr_idx| (nbr_idx, &arena[nbr_idx]))
            .filter(|(_, nbr)| nbr.id == id)
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns a mutable reference to the neighbor corresponding to the given
    // ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a mut Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |nbr_idx| (nbr_idx, &mut arena[nbr_idx]))
            .filter(|(_, nbr)| nbr.id == id)
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns a reference to the neighbor corresponding to the given Router
    // ID.
    pub fn get_by_router_id<'a>(
        &self,
        arena: &'a Arena<Neighbor>,
        router_id: Ipv4Addr,
    ) -> Option<(NeighborIndex, &'a Neighbor)> {
        self.router_id_tree
            .get(&router_id)
            .copied()
            .map(|nbr_idx| (nbr_idx, &arena[nbr_idx]))
    }

    // Returns a mutable reference to the neighbor corresponding to the given
    // network ID (the neighbor's interface address).
    pub fn get_mut_by_net_id<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        net_id: NeighborNetId,
    ) -> Option<(NeighborIndex, &'a mut Neighbor)> {
        self.net_id_tree
            .get(&net_id)
            .copied()
            .map(move |nbr_idx| (nbr_idx, &mut arena[nbr_idx]))
    }

    // Returns a mutable reference to the neighbor corresponding to the given
    // object key.
    pub fn get_mut_by_key<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        key: &NeighborKey,
    ) -> Result<(NeighborIndex, &'a mut Neighbor), Error> {
        match key {
            NeighborKey::Id(id) => self.get_mut_by_id(arena, *id),
            NeighborKey::Value(router_id) => {
                let nbr_idx = *self.router_id_tree.get(router_id).unwrap();
                Ok((nbr_idx, &mut arena[nbr_idx]))
            }
        }
    }

    // Returns an iterator visiting all neighbors.
    //
    // Neighbors are ordered by their Router IDs.
    pub fn iter<'a>(
        &'a self,
        arena: &'a Arena<Neighbor>,
    ) -> impl Iterator<Item = &'a Neighbor> + 'a {
        self.router_id_tree.values().map(|nbr_idx| &arena[*nbr_idx])
    }

    // Returns an iterator over all neighbor indexes.
    //
    // Neighbors are ordered by their Router IDs.
    pub fn indexes(&self) -> impl Iterator<Item = NeighborIndex> + '_ {
        self.router_id_tree.values().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.id_tree.is_empty()
    }

    pub fn contains_router_id(&self, router_id: Ipv4Addr) -> bool {
        self.router_id_tree.contains_key(&router_id)
    }
}

// ===== impl Lsdb =====

impl Lsdb {
    pub fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<LsaEntry>,
        lsa: Arc<Lsa>,
    ) -> (LsaEntryIndex, &'a mut LsaEntry) {
        self.next_id += 1;
        let lse = LsaEntry::new(self.next_id, lsa);
        let lsa_key = lse.data.hdr.key();
        let lse_idx = arena.0.insert(lse);

        // Link LSA entry to different collections.
        let lse = &mut arena[lse_idx];
        self.id_tree.insert(lse.id, lse_idx);
        self.tree
            .entry(lsa_key.lsa_type)
            .or_default()
            .insert(lsa_key, lse_idx);

        (lse_idx, lse)
    }

    pub fn delete(
        &mut self,
        arena: &mut Arena<LsaEntry>,
        lse_idx: LsaEntryIndex,
    ) {
        let lse = &mut arena[lse_idx];
        let lsa_key = lse.data.hdr.key();

        // Unlink LSA entry from different collections.
        self.id_tree.remove(&lse.id);
        if let Some(tree) = self.tree.get_mut(&lsa_key.lsa_type) {
            tree.remove(&lsa_key);
            if tree.is_empty() {
                self.tree.remove(&lsa_key.lsa_type);
            }
        }

        // Remove LSA entry from the arena.
        arena.0.remove(lse_idx);
    }

    // Returns a reference to the LSA entry corresponding to the given LSA
    // key.
    pub fn get<'a>(
        &self,
        arena: &'a Arena<LsaEntry>,
        lsa_key: &LsaKey,
    ) -> Option<(LsaEntryIndex, &'a LsaEntry)> {
        self.tree
            .get(&lsa_key.lsa_type)
            .and_then(|tree| tree.get(lsa_key))
            .copied()
            .map(|lse_idx| (lse_idx, &arena[lse_idx]))
    }

    // Returns an iterator visiting all LSA entries of the given LSA type.
    pub fn iter_by_type<'a>(
        &'a self,
        arena: &'a Arena<LsaEntry>,
        lsa_type: LsaType,
    ) -> impl Iterator<Item = (LsaEntryIndex, &'a LsaEntry)> + 'a {
        self.tree
            .get(&lsa_type)
            .into_iter()
            .flat_map(|tree| tree.values())
            .map(|lse_idx| (*lse_idx, &arena[*lse_idx]))
    }

    // Returns an iterator visiting all LSA entries.
    pub fn iter<'a>(
        &'a self,
        arena: &'a Arena<LsaEntry>,
    ) -> impl Iterator<Item = (LsaEntryIndex, &'a LsaEntry)> + 'a {
        self.tree
            .values()
            .flat_map(|tree| tree.values())
            .map(|lse_idx| (*lse_idx, &arena[*lse_idx]))
    }
}
