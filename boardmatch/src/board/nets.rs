//! Net fusion: front and back copper regions joined through plated holes.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::unionfind::UnionFind;
use serde::Serialize;

use super::holes::Hole;
use super::model::Side;
use super::pads::PadId;
use super::traces::TraceId;

pub type NetId = usize;

/// An electrically connected set of copper across both sides.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Net {
    pub id: NetId,
    pub front_traces: Vec<TraceId>,
    pub back_traces: Vec<TraceId>,
    pub front_pads: Vec<PadId>,
    pub back_pads: Vec<PadId>,
    /// Indices into the board's hole list.
    pub holes: Vec<usize>,
}

impl Net {
    pub fn pads(&self, side: Side) -> &[PadId] {
        match side {
            Side::Front => &self.front_pads,
            Side::Back => &self.back_pads,
        }
    }

    pub fn traces(&self, side: Side) -> &[TraceId] {
        match side {
            Side::Front => &self.front_traces,
            Side::Back => &self.back_traces,
        }
    }

    pub fn pad_count(&self) -> usize {
        self.front_pads.len() + self.back_pads.len()
    }
}

/// Per-side inputs to net fusion.
#[derive(Debug, Clone, Default)]
pub struct SideConnectivity {
    pub region_count: usize,
    pub pads_by_region: BTreeMap<TraceId, BTreeSet<PadId>>,
    pub orphan_pads: Vec<PadId>,
}

/// The board connectivity model.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NetTable {
    nets: Vec<Net>,
    #[serde(skip)]
    front_index: BTreeMap<PadId, NetId>,
    #[serde(skip)]
    back_index: BTreeMap<PadId, NetId>,
}

impl NetTable {
    /// Fuses regions linked by plated holes into nets.
    ///
    /// Nets that contain a hole linkage come first, in order of their lowest
    /// back region; every other front region and then every other back region
    /// follows as a singleton. Pads that landed in no copper become
    /// single-pad nets at the end.
    pub fn build(front: &SideConnectivity, back: &SideConnectivity, holes: &[Hole]) -> Self {
        let nf = front.region_count;
        let nb = back.region_count;
        let mut uf: UnionFind<usize> = UnionFind::new(nf + nb);
        let mut linked = BTreeSet::new();
        for hole in holes {
            if let (Some(f), Some(b)) = hole.kind.links() {
                if f < nf && b < nb {
                    uf.union(f, nf + b);
                    linked.insert(nf + b);
                }
            }
        }

        let order = linked.iter().copied().chain(0..nf).chain(nf..nf + nb);
        let mut net_of_root: BTreeMap<usize, NetId> = BTreeMap::new();
        let mut nets: Vec<Net> = Vec::new();
        for node in order {
            let root = uf.find(node);
            let id = *net_of_root.entry(root).or_insert_with(|| {
                nets.push(Net {
                    id: nets.len(),
                    ..Default::default()
                });
                nets.len() - 1
            });
            let net = &mut nets[id];
            if node < nf {
                if !net.front_traces.contains(&node) {
                    net.front_traces.push(node);
                }
            } else if !net.back_traces.contains(&(node - nf)) {
                net.back_traces.push(node - nf);
            }
        }

        for net in &mut nets {
            net.front_traces.sort_unstable();
            net.back_traces.sort_unstable();
            let front_pads: BTreeSet<PadId> = net
                .front_traces
                .iter()
                .filter_map(|t| front.pads_by_region.get(t))
                .flatten()
                .copied()
                .collect();
            let back_pads: BTreeSet<PadId> = net
                .back_traces
                .iter()
                .filter_map(|t| back.pads_by_region.get(t))
                .flatten()
                .copied()
                .collect();
            net.front_pads = front_pads.into_iter().collect();
            net.back_pads = back_pads.into_iter().collect();
        }

        for (index, hole) in holes.iter().enumerate() {
            let (f, b) = hole.kind.links();
            let node = f.filter(|&f| f < nf).or_else(|| b.filter(|&b| b < nb).map(|b| nf + b));
            if let Some(node) = node {
                if let Some(&id) = net_of_root.get(&uf.find(node)) {
                    nets[id].holes.push(index);
                }
            }
        }

        for (side, orphans) in [(Side::Front, &front.orphan_pads), (Side::Back, &back.orphan_pads)] {
            for &pad in orphans {
                let mut net = Net {
                    id: nets.len(),
                    ..Default::default()
                };
                match side {
                    Side::Front => net.front_pads.push(pad),
                    Side::Back => net.back_pads.push(pad),
                }
                nets.push(net);
            }
        }

        let mut table = Self {
            nets,
            ..Default::default()
        };
        table.reindex();
        tracing::debug!(
            "Net table: {} nets ({} front regions, {} back regions, {} hole links)",
            table.nets.len(),
            nf,
            nb,
            linked.len()
        );
        table
    }

    fn reindex(&mut self) {
        self.front_index.clear();
        self.back_index.clear();
        for net in &self.nets {
            for &p in &net.front_pads {
                self.front_index.insert(p, net.id);
            }
            for &p in &net.back_pads {
                self.back_index.insert(p, net.id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn get(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    /// The unique net holding `pad` on `side`.
    pub fn net_of_pad(&self, side: Side, pad: PadId) -> Option<NetId> {
        match side {
            Side::Front => self.front_index.get(&pad).copied(),
            Side::Back => self.back_index.get(&pad).copied(),
        }
    }

    pub fn net_of_trace(&self, side: Side, trace: TraceId) -> Option<NetId> {
        self.nets
            .iter()
            .find(|n| n.traces(side).contains(&trace))
            .map(|n| n.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::holes::{DrillRecord, HoleKind};
    use crate::geometry::PixelPoint;

    fn link(front: TraceId, back: TraceId) -> Hole {
        Hole {
            position: PixelPoint::new(0, 0),
            diameter_px: 4.0,
            record: DrillRecord {
                x_mm: 0.0,
                y_mm: 0.0,
                diameter_mm: 0.4,
                plated: true,
            },
            kind: HoleKind::Via {
                front: Some(front),
                back: Some(back),
            },
        }
    }

    fn side(regions: usize, pads: &[(TraceId, PadId)]) -> SideConnectivity {
        let mut by_region: BTreeMap<TraceId, BTreeSet<PadId>> = BTreeMap::new();
        for &(t, p) in pads {
            by_region.entry(t).or_default().insert(p);
        }
        SideConnectivity {
            region_count: regions,
            pads_by_region: by_region,
            orphan_pads: Vec::new(),
        }
    }

    #[test]
    fn test_fixed_point_merges_chains() {
        // F0 - B0 - F1 - B1 through three holes: one net
        let front = side(3, &[(0, 0), (1, 1), (2, 2)]);
        let back = side(2, &[(0, 5), (1, 6)]);
        let holes = vec![link(0, 0), link(1, 0), link(1, 1)];
        let table = NetTable::build(&front, &back, &holes);

        assert_eq!(table.len(), 2);
        let joined = table.get(0).expect("joined net");
        assert_eq!(joined.front_traces, vec![0, 1]);
        assert_eq!(joined.back_traces, vec![0, 1]);
        assert_eq!(joined.front_pads, vec![0, 1]);
        assert_eq!(joined.back_pads, vec![5, 6]);
        assert_eq!(joined.holes, vec![0, 1, 2]);

        let single = table.get(1).expect("singleton");
        assert_eq!(single.front_traces, vec![2]);
        assert_eq!(table.net_of_pad(Side::Front, 2), Some(1));
        assert_eq!(table.net_of_pad(Side::Back, 6), Some(0));
    }

    #[test]
    fn test_every_pad_in_at_most_one_net() {
        let mut front = side(2, &[(0, 0), (1, 1)]);
        front.orphan_pads = vec![2];
        let back = side(1, &[(0, 0)]);
        let table = NetTable::build(&front, &back, &[link(1, 0)]);

        let mut seen = BTreeSet::new();
        for net in table.iter() {
            for &p in &net.front_pads {
                assert!(seen.insert(p), "pad {} in two nets", p);
            }
        }
        assert_eq!(seen, BTreeSet::from([0, 1, 2]));
        assert!(table.net_of_pad(Side::Front, 2).is_some());
    }
}
