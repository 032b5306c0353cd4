//! Derived view of the canvas layers, rebuilt after every mutation batch.

use crate::geometry::{ENDPOINT_EPSILON, EndpointIndex};
use crate::strand::{End, Rgba, Strand};
use kurbo::Point;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered layer names, endpoint adjacency, mask pairs and set colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerState {
    pub order: Vec<String>,
    /// Bidirectional adjacency between strands with coincident endpoints.
    pub connections: BTreeMap<String, BTreeSet<String>>,
    /// Per-endpoint adjacency, indexed by [`End::index`].
    pub endpoint_connections: BTreeMap<String, [BTreeSet<String>; 2]>,
    pub masked_layers: BTreeSet<(String, String)>,
    pub colors: BTreeMap<i32, Rgba>,
    pub positions: BTreeMap<String, (Point, Point)>,
    pub selected_strand: Option<String>,
    pub newest_strand: Option<String>,
    pub newest_layer: Option<String>,
}

impl LayerState {
    /// Build the view from strands in canvas order.
    pub fn compute<'a>(
        strands: impl IntoIterator<Item = &'a Strand>,
        selected: Option<&str>,
        newest: Option<&str>,
    ) -> Self {
        let strands: Vec<&Strand> = strands.into_iter().collect();
        let mut state = Self {
            selected_strand: selected.map(str::to_string),
            newest_strand: newest.map(str::to_string),
            newest_layer: strands.last().map(|s| s.layer_name().to_string()),
            ..Self::default()
        };

        let mut index = EndpointIndex::new(ENDPOINT_EPSILON);
        for (i, strand) in strands.iter().enumerate() {
            let name = strand.layer_name().to_string();
            state.order.push(name.clone());
            state.positions.insert(name.clone(), (strand.endpoint(End::Start), strand.endpoint(End::End)));

            if let Some((first, second)) = strand.mask_components() {
                let lookup = |id| strands.iter().find(|s| s.id() == id).map(|s| s.layer_name().to_string());
                if let (Some(a), Some(b)) = (lookup(first), lookup(second)) {
                    state.masked_layers.insert((a, b));
                }
                continue;
            }

            let set = strand.set_number();
            if strand.is_main_strand() || !state.colors.contains_key(&set) {
                state.colors.insert(set, strand.core.color);
            }
            state.connections.entry(name.clone()).or_default();
            state.endpoint_connections.entry(name).or_default();
            for end in End::BOTH {
                index.insert((i, end), strand.endpoint(end));
            }
        }

        for (i, strand) in strands.iter().enumerate() {
            if strand.is_masked() {
                continue;
            }
            let name = strand.layer_name();
            for end in End::BOTH {
                for (j, _) in index.within(strand.endpoint(end), ENDPOINT_EPSILON) {
                    if j == i {
                        continue;
                    }
                    let other = strands[j].layer_name().to_string();
                    if let Some(ends) = state.endpoint_connections.get_mut(name) {
                        ends[end.index()].insert(other.clone());
                    }
                    state.connections.entry(name.to_string()).or_default().insert(other.clone());
                    state.connections.entry(other).or_default().insert(name.to_string());
                }
            }
        }
        state
    }

    /// Whether the given endpoint of `layer` touches another strand.
    pub fn end_connected(&self, layer: &str, end: End) -> bool {
        self.endpoint_connections
            .get(layer)
            .map(|ends| !ends[end.index()].is_empty())
            .unwrap_or(false)
    }

    /// Layers sharing an endpoint with `layer`.
    pub fn connected_layers(&self, layer: &str) -> Vec<&str> {
        self.connections
            .get(layer)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Color registered for a set.
    pub fn set_color(&self, set_number: i32) -> Option<Rgba> {
        self.colors.get(&set_number).copied()
    }

    /// Smallest set number not in use.
    pub fn next_set_number(&self) -> i32 {
        self.order
            .iter()
            .filter_map(|name| crate::strand::parse_layer_name(name))
            .map(|(set, _)| set)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }

    /// Set the endpoint discs of `strand` from the connections, letting
    /// manual overrides win.
    pub fn reconcile_circles(&self, strand: &mut Strand) {
        if strand.is_masked() {
            strand.core.has_circles = [false, false];
            return;
        }
        for end in End::BOTH {
            let i = end.index();
            strand.core.has_circles[i] = match strand.core.manual_circle_visibility[i] {
                Some(forced) => forced,
                None => self.end_connected(strand.layer_name(), end),
            };
        }
    }
}
