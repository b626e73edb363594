use super::super::{ClientId, Pertag, Tag};
use super::focus::focus;
use super::layout::arrange;
use super::State;
use crate::effect::Effect;
use crate::platform::WindowSystem;

fn refresh<W: WindowSystem>(state: &mut State, ws: &W, mon: usize) -> Vec<Effect> {
    let mut effects = focus(state, ws, None, false);
    effects.extend(arrange(state, Some(mon)));
    effects
}

pub fn view<W: WindowSystem>(state: &mut State, ws: &W, mon: usize, tags: Tag) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    let tags = tags.intersection(m.all_tags());
    if tags.is_empty() || tags == m.view() {
        return vec![];
    }
    tracing::info!(
        "View tags on monitor {}: {} -> {}",
        mon,
        m.view().mask(),
        tags.mask()
    );
    m.selected_tagset ^= 1;
    m.tagset[m.selected_tagset] = tags;
    m.pertag.previous = m.pertag.current;
    m.pertag.current = Pertag::slot_for(tags, m.tag_count);
    refresh(state, ws, mon)
}

pub fn toggle_view<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    mon: usize,
    tags: Tag,
) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    let all = m.all_tags();
    let new_view = m.view().toggle(tags).intersection(all);
    if new_view.is_empty() || new_view == m.view() {
        return vec![];
    }
    tracing::info!(
        "Toggle tags on monitor {}: {} -> {}",
        mon,
        m.view().mask(),
        new_view.mask()
    );
    m.tagset[m.selected_tagset] = new_view;

    let current = m.pertag.current;
    let keeps_current =
        current != 0 && new_view != all && new_view.intersects(Tag::new(current as u32));
    if !keeps_current {
        let slot = Pertag::slot_for(new_view, m.tag_count);
        if slot != current {
            m.pertag.previous = current;
            m.pertag.current = slot;
        }
    }
    refresh(state, ws, mon)
}

pub fn view_last<W: WindowSystem>(state: &mut State, ws: &W, mon: usize) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    if m.view() == m.previous_view() {
        return vec![];
    }
    tracing::info!(
        "View last on monitor {}: {} -> {}",
        mon,
        m.view().mask(),
        m.previous_view().mask()
    );
    m.selected_tagset ^= 1;
    std::mem::swap(&mut m.pertag.current, &mut m.pertag.previous);
    refresh(state, ws, mon)
}

pub fn tag_client<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    id: ClientId,
    tags: Tag,
) -> Vec<Effect> {
    let Some(mon) = state.registry.get(id).map(|c| c.monitor()) else {
        return vec![];
    };
    let Some(all) = state.registry.monitor(mon).map(|m| m.all_tags()) else {
        return vec![];
    };
    let tags = tags.intersection(all);
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if tags.is_empty() || tags == c.attrs.tags {
        return vec![];
    }
    tracing::info!(
        "Move window {:#x} to tags {}",
        c.window,
        tags.mask()
    );
    c.attrs.tags = tags;
    refresh(state, ws, mon)
}

pub fn toggle_tag<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    id: ClientId,
    tags: Tag,
) -> Vec<Effect> {
    let Some(current) = state.registry.get(id).map(|c| c.attrs.tags) else {
        return vec![];
    };
    let new_tags = current.toggle(tags);
    if new_tags.is_empty() {
        return vec![];
    }
    tag_client(state, ws, id, new_tags)
}
