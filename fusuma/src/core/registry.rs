//! Entity store for clients and monitors.
//!
//! Clients live in a generational arena. Each monitor threads two singly
//! linked lists through the arena: the attach order (tiling order) and the
//! stack order (z-order, head is topmost).

use std::collections::HashMap;

use super::{Attributes, Client, ClientId, Monitor, WindowId};

#[derive(Debug)]
struct Slot {
    generation: u32,
    client: Option<Client>,
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_window: HashMap<WindowId, ClientId>,
    pub monitors: Vec<Monitor>,
}

#[derive(Clone, Copy)]
enum Order {
    Attach,
    Stack,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_window.is_empty()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.client.as_ref()
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.client.as_mut()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.get(id).is_some()
    }

    pub fn by_window(&self, window: WindowId) -> Option<ClientId> {
        self.by_window.get(&window).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.slots.iter().filter_map(|s| s.client.as_ref())
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.iter().map(|c| c.id).collect()
    }

    pub fn monitor(&self, index: usize) -> Option<&Monitor> {
        self.monitors.get(index)
    }

    pub fn monitor_mut(&mut self, index: usize) -> Option<&mut Monitor> {
        self.monitors.get_mut(index)
    }

    fn next_of(&self, id: ClientId, order: Order) -> Option<ClientId> {
        let c = self.get(id)?;
        match order {
            Order::Attach => c.attach_next,
            Order::Stack => c.stack_next,
        }
    }

    fn set_next(&mut self, id: ClientId, order: Order, next: Option<ClientId>) {
        if let Some(c) = self.get_mut(id) {
            match order {
                Order::Attach => c.attach_next = next,
                Order::Stack => c.stack_next = next,
            }
        }
    }

    fn head(&self, mon: usize, order: Order) -> Option<ClientId> {
        let m = self.monitors.get(mon)?;
        match order {
            Order::Attach => m.clients,
            Order::Stack => m.stack,
        }
    }

    fn set_head(&mut self, mon: usize, order: Order, head: Option<ClientId>) {
        if let Some(m) = self.monitors.get_mut(mon) {
            match order {
                Order::Attach => m.clients = head,
                Order::Stack => m.stack = head,
            }
        }
    }

    fn order_iter(&self, mon: usize, order: Order) -> OrderIter<'_> {
        OrderIter {
            registry: self,
            next: self.head(mon, order),
            order,
        }
    }

    /// Attach order of `mon`, tiling order first to last.
    pub fn attach_iter(&self, mon: usize) -> OrderIter<'_> {
        self.order_iter(mon, Order::Attach)
    }

    /// Stack order of `mon`, topmost first.
    pub fn stack_iter(&self, mon: usize) -> OrderIter<'_> {
        self.order_iter(mon, Order::Stack)
    }

    pub fn attach_order(&self, mon: usize) -> Vec<ClientId> {
        self.attach_iter(mon).collect()
    }

    pub fn stack_order(&self, mon: usize) -> Vec<ClientId> {
        self.stack_iter(mon).collect()
    }

    fn push_front(&mut self, id: ClientId, order: Order) {
        let Some(mon) = self.get(id).map(|c| c.monitor()) else {
            return;
        };
        let head = self.head(mon, order);
        self.set_next(id, order, head);
        self.set_head(mon, order, Some(id));
    }

    fn insert_after(&mut self, id: ClientId, after: ClientId, order: Order) {
        let next = self.next_of(after, order);
        self.set_next(id, order, next);
        self.set_next(after, order, Some(id));
    }

    fn unlink(&mut self, id: ClientId, order: Order) {
        let Some(mon) = self.get(id).map(|c| c.monitor()) else {
            return;
        };
        let next = self.next_of(id, order);
        if self.head(mon, order) == Some(id) {
            self.set_head(mon, order, next);
        } else {
            let mut cur = self.head(mon, order);
            while let Some(c) = cur {
                let n = self.next_of(c, order);
                if n == Some(id) {
                    self.set_next(c, order, next);
                    break;
                }
                cur = n;
            }
        }
        self.set_next(id, order, None);
    }

    pub fn attach(&mut self, id: ClientId) {
        self.push_front(id, Order::Attach);
    }

    /// Attach directly after `after` in the attach order, which must be on
    /// the same monitor.
    pub fn attach_after(&mut self, id: ClientId, after: ClientId) {
        let same_monitor = match (self.get(id), self.get(after)) {
            (Some(a), Some(b)) => a.monitor() == b.monitor(),
            _ => false,
        };
        if same_monitor {
            self.insert_after(id, after, Order::Attach);
        } else {
            self.attach(id);
        }
    }

    pub fn detach(&mut self, id: ClientId) {
        self.unlink(id, Order::Attach);
    }

    pub fn attach_stack(&mut self, id: ClientId) {
        self.push_front(id, Order::Stack);
    }

    pub fn detach_stack(&mut self, id: ClientId) {
        self.unlink(id, Order::Stack);
    }

    /// Move `id` to the top of its monitor's stack order.
    pub fn raise(&mut self, id: ClientId) {
        if !self.get(id).is_some_and(|c| c.is_linked()) {
            return;
        }
        self.detach_stack(id);
        self.attach_stack(id);
    }

    /// Put `id` at the head of its monitor's attach order.
    pub fn pop_to_front(&mut self, id: ClientId) {
        if !self.get(id).is_some_and(|c| c.is_linked()) {
            return;
        }
        self.detach(id);
        self.attach(id);
    }

    /// Exchange the attach-order positions of two clients on one monitor.
    pub fn swap_attach(&mut self, a: ClientId, b: ClientId) {
        let Some(mon) = self.get(a).map(|c| c.monitor()) else {
            return;
        };
        if a == b || self.get(b).map(|c| c.monitor()) != Some(mon) {
            return;
        }
        let mut order = self.attach_order(mon);
        let (Some(ia), Some(ib)) = (
            order.iter().position(|x| *x == a),
            order.iter().position(|x| *x == b),
        ) else {
            return;
        };
        order.swap(ia, ib);
        self.relink(mon, Order::Attach, &order);
    }

    fn relink(&mut self, mon: usize, order: Order, ids: &[ClientId]) {
        for pair in ids.windows(2) {
            self.set_next(pair[0], order, Some(pair[1]));
        }
        if let Some(last) = ids.last() {
            self.set_next(*last, order, None);
        }
        self.set_head(mon, order, ids.first().copied());
    }

    /// Insert a new client into the arena and at the head of both orderings
    /// of its monitor.
    pub fn register(&mut self, window: WindowId, attrs: Attributes) -> ClientId {
        let id = match self.free.pop() {
            Some(index) => ClientId {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    client: None,
                });
                ClientId {
                    index: self.slots.len() as u32 - 1,
                    generation: 0,
                }
            }
        };
        self.slots[id.index as usize].client = Some(Client::new(id, window, attrs));
        self.by_window.insert(window, id);
        self.attach(id);
        self.attach_stack(id);
        id
    }

    /// Remove a client from both orderings and from the arena.
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        if self.get(id)?.is_linked() {
            self.detach(id);
            self.detach_stack(id);
        }
        for mon in &mut self.monitors {
            if mon.sel == Some(id) {
                mon.sel = None;
            }
        }
        let slot = &mut self.slots[id.index as usize];
        let client = slot.client.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        if self.by_window.get(&client.window) == Some(&id) {
            self.by_window.remove(&client.window);
        }
        Some(client)
    }

    /// Move a client to another monitor, at the head of both orderings.
    pub fn relocate(&mut self, id: ClientId, dest: usize) {
        let Some(c) = self.get(id) else {
            return;
        };
        if dest >= self.monitors.len() || c.monitor() == dest {
            return;
        }
        let src = c.monitor();
        let linked = c.is_linked();
        if linked {
            self.detach(id);
            self.detach_stack(id);
        }
        if self.monitors[src].sel == Some(id) {
            self.monitors[src].sel = None;
        }
        if let Some(c) = self.get_mut(id) {
            c.attrs.monitor = dest;
        }
        if linked {
            self.attach(id);
            self.attach_stack(id);
        }
    }

    /// Remove `id` from both orderings without dropping it; the caller
    /// marks it swallowed right after.
    pub fn take_out(&mut self, id: ClientId) {
        if self.get(id).is_some_and(|c| c.is_linked()) {
            self.detach(id);
            self.detach_stack(id);
        }
    }

    /// Put detached client `new` into the exact attach and stack positions
    /// of `old`, which leaves both orderings.
    pub fn replace(&mut self, old: ClientId, new: ClientId) {
        let Some(mon) = self.get(old).map(|c| c.monitor()) else {
            return;
        };
        if !self.contains(new) {
            return;
        }
        if let Some(c) = self.get_mut(new) {
            c.attrs.monitor = mon;
        }
        for order in [Order::Attach, Order::Stack] {
            let ids: Vec<ClientId> = self
                .order_iter(mon, order)
                .map(|x| if x == old { new } else { x })
                .collect();
            self.set_next(old, order, None);
            self.relink(mon, order, &ids);
        }
        if self.monitors[mon].sel == Some(old) {
            self.monitors[mon].sel = Some(new);
        }
    }

    /// Whether a client is shown under its monitor's current view.
    pub fn is_visible(&self, id: ClientId) -> bool {
        let Some(c) = self.get(id) else {
            return false;
        };
        let Some(mon) = self.monitors.get(c.monitor()) else {
            return false;
        };
        if c.dormant || !c.is_linked() || c.attrs.hidden {
            return false;
        }
        if mon.showing_desktop {
            return c.attrs.desktop || c.attrs.on_desktop;
        }
        if c.attrs.on_desktop {
            return false;
        }
        c.attrs.desktop || c.attrs.sticky || c.tags().intersects(mon.view())
    }

    /// Topmost visible client whose outer frame contains the point.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<ClientId> {
        let mon = self.monitors.iter().position(|m| m.screen.contains(x, y))?;
        self.stack_iter(mon).find(|id| {
            self.is_visible(*id) && self.get(*id).is_some_and(|c| c.outer().contains(x, y))
        })
    }

    /// Monitor containing the point, if any.
    pub fn monitor_at(&self, x: i32, y: i32) -> Option<usize> {
        self.monitors.iter().position(|m| m.screen.contains(x, y))
    }

    /// Monitor with the largest overlap with `rect`; `fallback` when none.
    pub fn monitor_for_rect(&self, rect: &super::Rect, fallback: usize) -> usize {
        let mut best = fallback;
        let mut best_area = 0;
        for (i, m) in self.monitors.iter().enumerate() {
            let area = m.screen.overlap_area(rect);
            if area > best_area {
                best_area = area;
                best = i;
            }
        }
        best
    }

    /// Clients whose title, class or instance contains `needle`
    /// (case-insensitive), in arena order.
    pub fn find(&self, needle: &str) -> Vec<ClientId> {
        let needle = needle.to_lowercase();
        self.iter()
            .filter(|c| {
                [&c.identity.title, &c.identity.class, &c.identity.instance]
                    .iter()
                    .any(|s| s.to_lowercase().contains(&needle))
            })
            .map(|c| c.id)
            .collect()
    }

    pub fn mark_dormant(&mut self, window: WindowId) -> Option<ClientId> {
        let id = self.by_window(window)?;
        if let Some(c) = self.get_mut(id) {
            if !c.dormant {
                tracing::warn!("Window {:#x} became invalid, marking dormant", window);
            }
            // Leave the orderings untouched until the next sweep.
            c.dormant = true;
        }
        Some(id)
    }

    /// Excise dormant clients. Must run between passes, never while an
    /// ordering is being walked.
    pub fn sweep_dormant(&mut self) -> Vec<Client> {
        let dormant: Vec<ClientId> = self.iter().filter(|c| c.dormant).map(|c| c.id).collect();
        let mut removed = Vec::new();
        for id in dormant {
            if let Some(c) = self.unregister(id) {
                removed.push(c);
            }
        }
        removed
    }

    /// Verify that every tracked client sits in exactly one monitor's
    /// attach order and stack order, once each.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut attach_seen: HashMap<ClientId, usize> = HashMap::new();
        let mut stack_seen: HashMap<ClientId, usize> = HashMap::new();
        for mon in 0..self.monitors.len() {
            for (seen, order) in [
                (&mut attach_seen, Order::Attach),
                (&mut stack_seen, Order::Stack),
            ] {
                let mut steps = 0;
                for id in self.order_iter(mon, order) {
                    steps += 1;
                    if steps > self.slots.len() {
                        return Err(format!("cycle in ordering of monitor {}", mon));
                    }
                    let Some(c) = self.get(id) else {
                        return Err(format!("stale handle {:?} on monitor {}", id, mon));
                    };
                    if c.monitor() != mon {
                        return Err(format!(
                            "client {:#x} listed on monitor {} but belongs to {}",
                            c.window,
                            mon,
                            c.monitor()
                        ));
                    }
                    *seen.entry(id).or_insert(0) += 1;
                }
            }
        }
        for c in self.iter() {
            let expected = if c.is_linked() { 1 } else { 0 };
            let a = attach_seen.get(&c.id).copied().unwrap_or(0);
            let s = stack_seen.get(&c.id).copied().unwrap_or(0);
            if a != expected || s != expected {
                return Err(format!(
                    "client {:#x}: attach {} stack {} (expected {})",
                    c.window, a, s, expected
                ));
            }
        }
        Ok(())
    }
}

pub struct OrderIter<'a> {
    registry: &'a Registry,
    next: Option<ClientId>,
    order: Order,
}

impl Iterator for OrderIter<'_> {
    type Item = ClientId;

    fn next(&mut self) -> Option<ClientId> {
        let cur = self.next?;
        self.next = self.registry.next_of(cur, self.order);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, Rect, Tag};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn registry(monitors: usize) -> Registry {
        let mut reg = Registry::new();
        let config = Config::new();
        for i in 0..monitors {
            reg.monitors.push(Monitor::new(
                i,
                Rect::new(i as i32 * 1000, 0, 1000, 800),
                &config,
            ));
        }
        reg
    }

    fn add(reg: &mut Registry, window: WindowId, mon: usize) -> ClientId {
        let id = reg.register(window, Attributes::new(Tag::new(1), mon, 1));
        reg.get_mut(id).unwrap().frame = Rect::new(mon as i32 * 1000 + 10, 10, 300, 200);
        id
    }

    #[test]
    fn test_register_attaches_at_head() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        assert_eq!(reg.attach_order(0), vec![b, a]);
        assert_eq!(reg.stack_order(0), vec![b, a]);
        assert_eq!(reg.by_window(2), Some(b));
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_stale_handle_after_unregister() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        reg.unregister(a);
        let b = add(&mut reg, 2, 0);
        assert_eq!(a.index, b.index);
        assert!(reg.get(a).is_none());
        assert!(reg.get(b).is_some());
        assert_eq!(reg.by_window(1), None);
    }

    #[test]
    fn test_relocate_moves_between_monitors() {
        let mut reg = registry(2);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        reg.monitors[0].sel = Some(a);
        reg.relocate(a, 1);
        assert_eq!(reg.attach_order(0), vec![b]);
        assert_eq!(reg.stack_order(1), vec![a]);
        assert_eq!(reg.get(a).unwrap().monitor(), 1);
        assert_eq!(reg.monitors[0].sel, None);
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_raise_and_swap() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        let c = add(&mut reg, 3, 0);
        reg.raise(a);
        assert_eq!(reg.stack_order(0), vec![a, c, b]);
        reg.swap_attach(c, a);
        assert_eq!(reg.attach_order(0), vec![a, b, c]);
        reg.pop_to_front(b);
        assert_eq!(reg.attach_order(0), vec![b, a, c]);
        reg.detach(c);
        reg.attach_after(c, b);
        assert_eq!(reg.attach_order(0), vec![b, c, a]);
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_hit_test_honors_stack_and_visibility() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        assert_eq!(reg.hit_test(50, 50), Some(b));
        reg.get_mut(b).unwrap().attrs.tags = Tag::new(2);
        assert_eq!(reg.hit_test(50, 50), Some(a));
        reg.get_mut(a).unwrap().attrs.hidden = true;
        assert_eq!(reg.hit_test(50, 50), None);
        assert_eq!(reg.hit_test(5000, 50), None);
    }

    #[test]
    fn test_visibility_under_desktop_surface() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let d = add(&mut reg, 2, 0);
        reg.get_mut(d).unwrap().attrs.on_desktop = true;
        assert!(reg.is_visible(a));
        assert!(!reg.is_visible(d));
        reg.monitors[0].showing_desktop = true;
        assert!(!reg.is_visible(a));
        assert!(reg.is_visible(d));
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        reg.get_mut(a).unwrap().identity.title = "Mozilla Firefox".to_string();
        reg.get_mut(b).unwrap().identity.class = "XTerm".to_string();
        assert_eq!(reg.find("firefox"), vec![a]);
        assert_eq!(reg.find("xterm"), vec![b]);
        assert!(reg.find("emacs").is_empty());
    }

    #[test]
    fn test_dormant_clients_stay_linked_until_sweep() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let b = add(&mut reg, 2, 0);
        reg.mark_dormant(1);
        assert_eq!(reg.attach_order(0), vec![b, a]);
        reg.check_invariants().unwrap();
        let removed = reg.sweep_dormant();
        assert_eq!(removed.len(), 1);
        assert_eq!(reg.attach_order(0), vec![b]);
        assert_eq!(reg.stack_order(0), vec![b]);
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_replace_takes_positions() {
        let mut reg = registry(1);
        let a = add(&mut reg, 1, 0);
        let t = add(&mut reg, 2, 0);
        let c = add(&mut reg, 3, 0);
        let n = add(&mut reg, 4, 0);
        reg.take_out(n);
        reg.get_mut(n).unwrap().swallowing = Some(t);
        reg.replace(t, n);
        reg.get_mut(t).unwrap().swallowed_by = Some(n);
        assert_eq!(reg.attach_order(0), vec![c, n, a]);
        assert_eq!(reg.stack_order(0), vec![c, n, a]);
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_random_operations_keep_orderings_consistent() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut reg = registry(3);
        let mut live: Vec<ClientId> = Vec::new();
        let mut next_window = 1;

        for _ in 0..2000 {
            match rng.gen_range(0..6) {
                0 | 1 => {
                    let mon = rng.gen_range(0..3);
                    live.push(add(&mut reg, next_window, mon));
                    next_window += 1;
                }
                2 if !live.is_empty() => {
                    let i = rng.gen_range(0..live.len());
                    let id = live.swap_remove(i);
                    assert!(reg.unregister(id).is_some());
                }
                3 if !live.is_empty() => {
                    let id = live[rng.gen_range(0..live.len())];
                    reg.relocate(id, rng.gen_range(0..3));
                }
                4 if !live.is_empty() => {
                    let id = live[rng.gen_range(0..live.len())];
                    if rng.gen_bool(0.5) {
                        reg.raise(id);
                    } else {
                        reg.pop_to_front(id);
                    }
                }
                5 if !live.is_empty() => {
                    let id = live[rng.gen_range(0..live.len())];
                    let window = reg.get(id).unwrap().window;
                    reg.mark_dormant(window);
                    reg.check_invariants().unwrap();
                    for c in reg.sweep_dormant() {
                        live.retain(|x| *x != c.id);
                    }
                }
                _ => {}
            }
            reg.check_invariants().unwrap();
        }
        assert_eq!(reg.len(), live.len());
    }
}
