use super::{ClientId, Config, LayoutKind, Rect, Tag};

/// Per-view settings. Slot 0 belongs to the "all tags" view, slot `n` to
/// views whose first tag is `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pertag {
    pub current: usize,
    pub previous: usize,
    pub master_count: Vec<u32>,
    pub master_fraction: Vec<f32>,
    pub layout: Vec<LayoutKind>,
    pub gaps: Vec<bool>,
}

impl Pertag {
    fn new(config: &Config, monitor: usize) -> Self {
        let settings = config.settings(monitor);
        let slots = settings.tag_count as usize + 1;
        let mut pertag = Self {
            current: 1,
            previous: 1,
            master_count: vec![settings.master_count; slots],
            master_fraction: vec![settings.master_fraction; slots],
            layout: vec![settings.layout; slots],
            gaps: vec![settings.gaps; slots],
        };
        for tag in 1..slots {
            let overrides = config.tag_settings(monitor, tag as u32);
            if let Some(layout) = overrides.layout {
                pertag.layout[tag] = layout;
            }
            if let Some(n) = overrides.master_count {
                pertag.master_count[tag] = n;
            }
            if let Some(f) = overrides.master_fraction {
                pertag.master_fraction[tag] = f;
            }
            if let Some(g) = overrides.gaps {
                pertag.gaps[tag] = g;
            }
        }
        pertag
    }

    /// Slot for a view selector.
    pub fn slot_for(view: Tag, tag_count: u32) -> usize {
        if view == Tag::all(tag_count) && tag_count > 1 {
            return 0;
        }
        view.first_tag().map(|t| t as usize).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct Monitor {
    pub index: usize,
    /// Physical output bounds.
    pub screen: Rect,
    /// Output minus reserved bar space.
    pub work_area: Rect,
    pub tagset: [Tag; 2],
    pub selected_tagset: usize,
    pub tag_count: u32,
    pub pertag: Pertag,
    pub show_bar: bool,
    pub bar_height: u32,
    pub gap_size: u32,
    pub showing_desktop: bool,
    pub symbol: String,
    pub sel: Option<ClientId>,
    pub(crate) clients: Option<ClientId>,
    pub(crate) stack: Option<ClientId>,
}

impl Monitor {
    pub fn new(index: usize, screen: Rect, config: &Config) -> Self {
        let settings = config.settings(index);
        let mut mon = Self {
            index,
            screen,
            work_area: screen,
            tagset: [Tag::new(1); 2],
            selected_tagset: 0,
            tag_count: settings.tag_count,
            pertag: Pertag::new(config, index),
            show_bar: settings.show_bar,
            bar_height: settings.bar_height,
            gap_size: settings.gap_size,
            showing_desktop: false,
            symbol: String::new(),
            sel: None,
            clients: None,
            stack: None,
        };
        mon.symbol = mon.layout().symbol().to_string();
        mon.update_work_area();
        mon
    }

    pub fn view(&self) -> Tag {
        self.tagset[self.selected_tagset]
    }

    pub fn previous_view(&self) -> Tag {
        self.tagset[self.selected_tagset ^ 1]
    }

    pub fn all_tags(&self) -> Tag {
        Tag::all(self.tag_count)
    }

    pub fn layout(&self) -> LayoutKind {
        self.pertag.layout[self.pertag.current]
    }

    pub fn master_count(&self) -> u32 {
        self.pertag.master_count[self.pertag.current]
    }

    pub fn master_fraction(&self) -> f32 {
        self.pertag.master_fraction[self.pertag.current]
    }

    pub fn gaps(&self) -> bool {
        self.pertag.gaps[self.pertag.current]
    }

    pub fn set_layout(&mut self, layout: LayoutKind) {
        let slot = self.pertag.current;
        self.pertag.layout[slot] = layout;
    }

    pub fn set_master_count(&mut self, n: u32) {
        let slot = self.pertag.current;
        self.pertag.master_count[slot] = n;
    }

    pub fn set_master_fraction(&mut self, f: f32) {
        let slot = self.pertag.current;
        self.pertag.master_fraction[slot] = f.clamp(0.05, 0.95);
    }

    pub fn set_gaps(&mut self, gaps: bool) {
        let slot = self.pertag.current;
        self.pertag.gaps[slot] = gaps;
    }

    pub fn update_work_area(&mut self) {
        let bar = if self.show_bar {
            self.bar_height.min(self.screen.height.saturating_sub(1))
        } else {
            0
        };
        self.work_area = Rect::new(
            self.screen.x,
            self.screen.y + bar as i32,
            self.screen.width,
            self.screen.height - bar,
        );
    }

    /// Gap in effect for the current view.
    pub fn gap(&self) -> u32 {
        if self.gaps() {
            self.gap_size
        } else {
            0
        }
    }
}
