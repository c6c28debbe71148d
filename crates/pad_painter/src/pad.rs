//! The pad painter: one node of the canvas tree.
//!
//! Geometry lives in [`crate::geometry`], snapshot synchronization in
//! [`crate::sync`] and user interaction in [`crate::bridge`]; they all
//! extend [`PadPainter`] with further `impl` blocks.

use crate::bridge::{PadButton, PadEvent};
use crate::colors::{auto_palette, palette_position, ColorEntryExt, PadColors};
use crate::context::PaintContext;
use crate::painter::{CanvasHost, Drawn, ObjectPainter, Transport};
use crate::queue::{DrawKind, DrawQueue};
use crate::registry::{EntryKey, PainterHandle, Registry, RegistryEntry, RemoveTarget, Removal};
use crate::LocalBoxFuture;
use glam::Vec2;
use pad_model::{class_names, PadAttributes, PadId, PadOptions, PixelRect, SnapId, SnapObject};
use palette::Srgba;
use protocol::{ColorEntry, SnapshotEntry, SnapshotKind};
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Disposed,
}

/// Pixel area currently covered by a pad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub rect: PixelRect,
    pub visible: bool,
    /// Height to width ratio used when the host reports no height.
    pub height_factor: f64,
    pub scale: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            rect: PixelRect::default(),
            visible: true,
            height_factor: 0.66,
            scale: 1.0,
        }
    }
}

/// Objects in a primitive list that configure the pad instead of being
/// drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialObject {
    Style,
    ListOfColors,
    CurrentColorPalette,
}

impl SpecialObject {
    pub fn classify(object: &SnapObject) -> Option<Self> {
        if object.is(class_names::STYLE) {
            return Some(Self::Style);
        }
        if object.is(class_names::OBJ_ARRAY) {
            return match object.name.as_str() {
                "ListOfColors" => Some(Self::ListOfColors),
                "CurrentColorPalette" => Some(Self::CurrentColorPalette),
                _ => None,
            };
        }
        None
    }
}

/// Which painters a tree walk visits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PainterScope {
    All,
    /// Only pads, recursively.
    Pads,
    /// Only object painters of this pad.
    Objects,
}

pub(crate) struct PadState {
    pub attributes: PadAttributes,
    pub options: PadOptions,
    pub lifecycle: Lifecycle,
    pub surface: Surface,
    pub snap_id: Option<SnapId>,
    pub active: bool,
    pub read_only: bool,
    pub has_execs: bool,
    pub deliver_move_events: bool,
    /// Last primitive list received from the server.
    pub snap_primitives: Option<Vec<SnapshotEntry>>,
    pub draw_disabled: bool,
    pub buttons: Vec<PadButton>,
    pub num_primitives: usize,
    pub num_specials: usize,
    /// Positions of special objects in the pad's own primitive list.
    pub specials: BTreeSet<usize>,
}

impl PadState {
    fn new(attributes: PadAttributes) -> Self {
        Self {
            attributes,
            options: PadOptions::default(),
            lifecycle: Lifecycle::Uninitialized,
            surface: Surface::default(),
            snap_id: None,
            active: false,
            read_only: false,
            has_execs: false,
            deliver_move_events: false,
            snap_primitives: None,
            draw_disabled: false,
            buttons: Vec::new(),
            num_primitives: 0,
            num_specials: 0,
            specials: BTreeSet::new(),
        }
    }
}

/// Receives pad events such as selection changes.
pub type PadEventReceiver = Rc<dyn Fn(&PadEvent)>;

/// Hook called after every completed snapshot pass on the canvas.
pub type CanvasUpdatedHook = Rc<dyn Fn(&Rc<PadPainter>)>;

/// State that only exists on the root pad.
pub(crate) struct CanvasState {
    pub host: Rc<dyn CanvasHost>,
    pub fixed_size: Cell<bool>,
    pub enlarged: RefCell<Weak<PadPainter>>,
    pub viewport_enlarged: Cell<bool>,
    pub transport: RefCell<Option<Rc<dyn Transport>>>,
    pub pad_events: RefCell<Option<PadEventReceiver>>,
    pub on_updated: RefCell<Option<CanvasUpdatedHook>>,
    pub resize_generation: Cell<u64>,
    pub ignore_resize: Cell<bool>,
    /// Last measured size that was large enough to draw.
    pub last_size: Cell<Option<Vec2>>,
    pub last_grayscale: Cell<Option<bool>>,
}

pub struct PadPainter {
    id: PadId,
    this: Weak<PadPainter>,
    pub(crate) ctx: Rc<PaintContext>,
    parent: Weak<PadPainter>,
    pub(crate) canvas: Option<CanvasState>,
    pub(crate) state: RefCell<PadState>,
    pub(crate) queue: DrawQueue,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) colors: RefCell<PadColors>,
}

impl PadPainter {
    /// Root pad of a drawing tree, hosted by `host`.
    pub fn canvas(
        ctx: Rc<PaintContext>,
        attributes: PadAttributes,
        host: Rc<dyn CanvasHost>,
    ) -> Rc<Self> {
        let fixed_size = ctx.config().batch;
        Rc::new_cyclic(|this| Self {
            id: PadId::new(),
            this: this.clone(),
            ctx,
            parent: Weak::new(),
            canvas: Some(CanvasState {
                host,
                fixed_size: Cell::new(fixed_size),
                enlarged: RefCell::new(Weak::new()),
                viewport_enlarged: Cell::new(false),
                transport: RefCell::new(None),
                pad_events: RefCell::new(None),
                on_updated: RefCell::new(None),
                resize_generation: Cell::new(0),
                ignore_resize: Cell::new(false),
                last_size: Cell::new(None),
                last_grayscale: Cell::new(None),
            }),
            state: RefCell::new(PadState::new(attributes)),
            queue: DrawQueue::new(),
            registry: RefCell::new(Registry::new()),
            colors: RefCell::new(PadColors::default()),
        })
    }

    /// Nested pad. The caller registers it in the parent's registry.
    pub fn sub_pad(parent: &Rc<PadPainter>, attributes: PadAttributes) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: PadId::new(),
            this: this.clone(),
            ctx: parent.ctx.clone(),
            parent: Rc::downgrade(parent),
            canvas: None,
            state: RefCell::new(PadState::new(attributes)),
            queue: DrawQueue::new(),
            registry: RefCell::new(Registry::new()),
            colors: RefCell::new(PadColors::default()),
        })
    }

    pub fn id(&self) -> PadId {
        self.id
    }

    pub fn ctx(&self) -> &Rc<PaintContext> {
        &self.ctx
    }

    pub(crate) fn this(&self) -> Option<Rc<PadPainter>> {
        self.this.upgrade()
    }

    pub fn parent(&self) -> Option<Rc<PadPainter>> {
        self.parent.upgrade()
    }

    pub fn is_canvas(&self) -> bool {
        self.canvas.is_some()
    }

    /// Root of the tree this pad belongs to.
    pub fn canvas_painter(&self) -> Option<Rc<PadPainter>> {
        if self.is_canvas() {
            return self.this();
        }
        let mut current = self.parent();
        while let Some(pad) = current {
            if pad.is_canvas() {
                return Some(pad);
            }
            current = pad.parent();
        }
        None
    }

    /// Whether `ancestor` is this pad or one of its parents.
    pub fn is_within(&self, ancestor: &PadPainter) -> bool {
        if std::ptr::eq(self, ancestor) {
            return true;
        }
        let mut current = self.parent();
        while let Some(pad) = current {
            if std::ptr::eq(Rc::as_ptr(&pad), ancestor) {
                return true;
            }
            current = pad.parent();
        }
        false
    }

    pub fn name(&self) -> String {
        self.state.borrow().attributes.name.clone()
    }

    pub fn class_name(&self) -> String {
        self.state.borrow().attributes.typename.clone()
    }

    pub fn attributes(&self) -> Ref<'_, PadAttributes> {
        Ref::map(self.state.borrow(), |state| &state.attributes)
    }

    pub fn with_attributes_mut<R>(&self, f: impl FnOnce(&mut PadAttributes) -> R) -> R {
        f(&mut self.state.borrow_mut().attributes)
    }

    pub fn options(&self) -> PadOptions {
        self.state.borrow().options.clone()
    }

    pub fn snap_id(&self) -> Option<SnapId> {
        self.state.borrow().snap_id.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle
    }

    pub fn surface(&self) -> Surface {
        self.state.borrow().surface
    }

    pub fn pad_rect(&self) -> PixelRect {
        self.state.borrow().surface.rect
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().surface.visible
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn set_active(&self, active: bool) {
        self.state.borrow_mut().active = active;
        if active {
            if let Some(this) = self.this() {
                self.ctx.set_active_pad(&this);
            }
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.state.borrow().read_only
    }

    pub fn has_execs(&self) -> bool {
        self.state.borrow().has_execs
    }

    pub fn delivers_move_events(&self) -> bool {
        self.state.borrow().deliver_move_events
    }

    pub fn is_batch(&self) -> bool {
        self.ctx.config().batch
    }

    pub fn is_editable(&self) -> bool {
        self.state.borrow().attributes.editable
    }

    pub fn doing_draw(&self) -> bool {
        self.queue.doing_draw()
    }

    pub fn queue(&self) -> &DrawQueue {
        &self.queue
    }

    /// Transport of the canvas, present in online mode.
    pub fn transport(&self) -> Option<Rc<dyn Transport>> {
        let canvas = self.canvas_painter()?;
        let state = canvas.canvas.as_ref()?;
        let transport = state.transport.borrow().clone();
        transport
    }

    pub fn is_online(&self) -> bool {
        self.transport().is_some()
    }

    /// Connect the canvas to a remote peer. No effect on sub-pads.
    pub fn set_transport(&self, transport: Option<Rc<dyn Transport>>) {
        if let Some(canvas) = &self.canvas {
            *canvas.transport.borrow_mut() = transport;
        }
    }

    pub fn host(&self) -> Option<Rc<dyn CanvasHost>> {
        let canvas = self.canvas_painter()?;
        let host = canvas.canvas.as_ref().map(|state| state.host.clone());
        host
    }

    pub fn is_fixed_size(&self) -> bool {
        self.canvas_painter()
            .and_then(|canvas| canvas.canvas.as_ref().map(|state| state.fixed_size.get()))
            .unwrap_or(false)
    }

    pub fn set_fixed_size(&self, fixed: bool) {
        if let Some(canvas) = &self.canvas {
            canvas.fixed_size.set(fixed);
        }
    }

    pub fn set_ignore_resize(&self, ignore: bool) {
        if let Some(canvas) = &self.canvas {
            canvas.ignore_resize.set(ignore);
        }
    }

    pub fn on_canvas_updated(&self, hook: Option<CanvasUpdatedHook>) {
        if let Some(canvas) = &self.canvas {
            *canvas.on_updated.borrow_mut() = hook;
        }
    }

    pub(crate) fn notify_canvas_updated(&self) {
        let Some(canvas) = &self.canvas else {
            return;
        };
        let hook = canvas.on_updated.borrow().clone();
        if let (Some(hook), Some(this)) = (hook, self.this()) {
            hook(&this);
        }
    }

    /// Decode a draw option string and apply it to the pad attributes.
    pub fn decode_options(&self, opt: &str) {
        let options = PadOptions::decode(opt);
        let is_canvas = self.is_canvas();
        if options.fix_size && is_canvas {
            self.set_fixed_size(true);
        }
        let mut state = self.state.borrow_mut();
        options.apply(&mut state.attributes, is_canvas);
        state.options = options;
    }

    pub fn registry(&self) -> Ref<'_, Registry> {
        self.registry.borrow()
    }

    /// Handles of all painters in drawing order.
    pub fn painters(&self) -> Vec<PainterHandle> {
        self.registry.borrow().painters()
    }

    pub fn num_painters(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn add_painter(&self, entry: RegistryEntry) -> EntryKey {
        self.registry.borrow_mut().add(entry)
    }

    /// Register a drawn object and its secondaries.
    pub fn add_drawn(&self, drawn: Drawn, snap_id: Option<SnapId>, primitive: bool) -> EntryKey {
        fn add_secondaries(registry: &mut Registry, parent: EntryKey, secondaries: Vec<(String, Drawn)>) {
            for (key, drawn) in secondaries {
                let child = registry.add_derived(parent, &key, PainterHandle::Object(drawn.painter));
                add_secondaries(registry, child, drawn.secondaries);
            }
        }

        let mut registry = self.registry.borrow_mut();
        let mut entry = RegistryEntry::new(PainterHandle::Object(drawn.painter)).with_snap_id(snap_id);
        entry.primitive = primitive;
        let key = registry.add(entry);
        add_secondaries(&mut registry, key, drawn.secondaries);
        key
    }

    /// Remove a painter with its secondaries. When only secondaries are
    /// cleaned and the main painter disappears, the frame zoom is reset.
    pub fn remove_primitive(&self, target: RemoveTarget, clean_only_secondary: bool) -> Removal {
        let had_main = clean_only_secondary && self.registry.borrow().main().is_some();
        let detached = self
            .registry
            .borrow_mut()
            .remove(target, clean_only_secondary);
        let removal = detached.cleanup();

        if had_main && self.registry.borrow().main().is_none() {
            if let Some(frame) = self.frame_painter() {
                frame.reset_zoom();
            }
        }
        removal
    }

    /// Remove every painter matching `predicate`; true if any was removed.
    pub fn clean_primitives(&self, predicate: impl Fn(&RegistryEntry) -> bool) -> bool {
        let detached = self.registry.borrow_mut().clean_all(predicate);
        let any = !detached.is_empty();
        detached.cleanup();
        any
    }

    pub fn main_painter(&self) -> Option<PainterHandle> {
        self.registry.borrow().main_painter().cloned()
    }

    pub fn frame_painter(&self) -> Option<Rc<dyn ObjectPainter>> {
        let registry = self.registry.borrow();
        let frame = registry
            .iter()
            .filter_map(|(_, entry)| entry.painter.as_object())
            .find(|painter| painter.is_frame())
            .cloned();
        frame
    }

    /// Frame area from the frame painter, or derived from the margins.
    pub fn frame_rect(&self) -> PixelRect {
        if let Some(ranges) = self.frame_painter().and_then(|frame| frame.frame_ranges()) {
            return ranges.frame_rect;
        }
        let state = self.state.borrow();
        let size = state.surface.rect.size;
        let margins = state.attributes.margins();
        let inner = margins.inner_size(size);
        PixelRect::new(
            (size.x as f64 * margins.left) as f32,
            (size.y as f64 * margins.top) as f32,
            inner.x,
            inner.y,
        )
    }

    /// Dispose the pad: clean all painters and drop canvas resources.
    pub fn cleanup(&self) {
        if self.queue.doing_draw() {
            log::error!("Pad {} cleaned up while drawing", self.name());
        }
        let detached = self.registry.borrow_mut().clear();
        detached.cleanup();

        {
            let mut state = self.state.borrow_mut();
            state.lifecycle = Lifecycle::Disposed;
            state.buttons.clear();
            state.snap_primitives = None;
            state.specials.clear();
        }
        *self.colors.borrow_mut() = PadColors::default();

        if let Some(canvas) = &self.canvas {
            *canvas.enlarged.borrow_mut() = Weak::new();
            *canvas.transport.borrow_mut() = None;
            *canvas.pad_events.borrow_mut() = None;
            *canvas.on_updated.borrow_mut() = None;
            // Invalidates a pending resize notification
            canvas
                .resize_generation
                .set(canvas.resize_generation.get() + 1);
        }
        log::debug!("Pad {} ({}) disposed", self.name(), self.id);
    }

    /// Whether the canvas is in grayscale mode.
    pub fn is_grayscale(&self) -> bool {
        match self.canvas_painter() {
            Some(canvas) => canvas.attributes().is_grayscale(),
            None => false,
        }
    }

    /// Switch grayscale mode, or with `None` re-read it from the pad bits.
    pub fn set_grayscale(&self, flag: Option<bool>) {
        let Some(canvas) = &self.canvas else {
            return;
        };

        let (flag, changed) = {
            let mut state = self.state.borrow_mut();
            let current = state.attributes.is_grayscale();
            match flag {
                None => (
                    current,
                    canvas.last_grayscale.get().is_some_and(|last| last != current),
                ),
                Some(flag) if flag != current => {
                    state.attributes.invert_bit(pad_model::K_IS_GRAYSCALE);
                    (flag, true)
                }
                Some(flag) => (flag, false),
            }
        };

        if changed {
            if let Some(this) = self.this() {
                this.for_each_painter(PainterScope::All, &mut |painter| {
                    if let PainterHandle::Object(painter) = painter {
                        painter.reset_palette();
                    }
                });
            }
        }

        canvas.last_grayscale.set(Some(flag));
        self.colors.borrow_mut().regrade(flag);
    }

    /// Color by index: pad overrides first, then parents, then the global
    /// table. Converted to gray on grayscale canvases.
    pub fn color(&self, index: u32) -> Option<Srgba<u8>> {
        let mut found = self.colors.borrow().color(index);
        let mut current = self.parent();
        while found.is_none() {
            let Some(pad) = current else {
                break;
            };
            found = pad.colors.borrow().color(index);
            current = pad.parent();
        }
        let color = found.or_else(|| self.ctx.colors().get(index))?;
        Some(if self.is_grayscale() {
            crate::colors::gray_level(color)
        } else {
            color
        })
    }

    /// Palette indexes of this pad or of the canvas.
    fn palette_indexes(&self) -> Option<Vec<u32>> {
        let own = self.colors.borrow().palette_indexes.clone();
        if own.is_some() {
            return own;
        }
        let canvas = self.canvas_painter()?;
        if std::ptr::eq(Rc::as_ptr(&canvas), self) {
            return None;
        }
        let indexes = canvas.colors.borrow().palette_indexes.clone();
        indexes
    }

    /// Pick the next automatic color index for a primitive of this pad.
    pub fn get_auto_color(&self, count: Option<usize>) -> u32 {
        let count = count.unwrap_or_else(|| {
            let state = self.state.borrow();
            let total = if state.num_primitives == 0 {
                5
            } else {
                state.num_primitives
            };
            total.saturating_sub(state.num_specials)
        });
        let count = count.max(2);
        let index = self.colors.borrow().next_auto_index(count);

        if let Some(indexes) = self.palette_indexes().filter(|indexes| !indexes.is_empty()) {
            return indexes[palette_position(index, count, indexes.len())];
        }

        let palette = auto_palette(self.is_grayscale());
        let color = palette[palette_position(index, count, palette.len())];
        self.ctx.colors_mut().add_color(color)
    }

    /// Apply a special object; returns false for ordinary objects.
    pub fn check_special(&self, object: &SnapObject) -> bool {
        let Some(kind) = SpecialObject::classify(object) else {
            return false;
        };
        let options = self.options();
        let grayscale = self.is_grayscale();

        match kind {
            SpecialObject::Style => self.ctx.merge_style(object),
            SpecialObject::ListOfColors => {
                let entries: Vec<ColorEntry> =
                    object.items().iter().filter_map(tcolor_entry).collect();

                if options.create_palette > 0 {
                    let take = (options.create_palette as usize).min(entries.len());
                    let colors: Vec<Srgba<u8>> = entries[entries.len() - take..]
                        .iter()
                        .map(ColorEntry::to_srgba)
                        .collect();
                    if !colors.is_empty() {
                        self.colors.borrow_mut().set_palette_colors(colors, grayscale);
                    }
                }

                if options.global_colors {
                    self.ctx.colors_mut().adopt(&entries);
                }

                let custom = options
                    .local_colors
                    .then(|| self.ctx.colors().extended(&entries, false));
                self.colors.borrow_mut().custom_colors = custom;
            }
            SpecialObject::CurrentColorPalette => {
                let mut indexes = Vec::new();
                let mut colors = Vec::new();
                let mut missing = false;
                for (n, item) in object.items().iter().enumerate() {
                    let is_color = item.get("_typename").and_then(Value::as_str)
                        == Some(class_names::COLOR);
                    match tcolor_entry(item).filter(|_| is_color) {
                        Some(entry) => {
                            indexes.push(entry.index);
                            colors.push(entry.to_srgba());
                        }
                        None => {
                            log::warn!("Missing color with index {}", n);
                            missing = true;
                        }
                    }
                }

                let mut pad_colors = self.colors.borrow_mut();
                if !missing && !options.ignore_palette {
                    pad_colors.palette_indexes = Some(indexes);
                    pad_colors.set_palette_colors(colors, grayscale);
                } else {
                    pad_colors.clear_palette();
                }
            }
        }
        true
    }

    /// Apply and mark the special objects of the pad's own primitive list.
    pub fn check_specials_in_primitives(&self, count_specials: bool) {
        let objects: Vec<SnapObject> = self
            .state
            .borrow()
            .attributes
            .primitives
            .as_ref()
            .map(|list| list.arr.clone())
            .unwrap_or_default();

        let mut specials = BTreeSet::new();
        for (index, object) in objects.iter().enumerate() {
            if self.check_special(object) {
                specials.insert(index);
            }
        }

        let mut state = self.state.borrow_mut();
        if count_specials {
            state.num_specials = specials.len();
        }
        state.specials = specials;
    }

    /// True if anything besides sub-pads is there to draw.
    pub fn has_objects_to_draw(&self) -> bool {
        let state = self.state.borrow();
        let local = state
            .attributes
            .primitives
            .as_ref()
            .is_some_and(|list| list.arr.iter().any(|object| !object.is(class_names::PAD)));
        let remote = state.snap_primitives.as_ref().is_some_and(|list| {
            list.iter()
                .any(|snap| matches!(snap.kind, SnapshotKind::Object | SnapshotKind::Svg))
        });
        local || remote
    }

    /// Take the attributes of a new pad object and update the painters of
    /// its primitives in order. Returns true if any painter changed.
    pub fn update_from_object(&self, object: &SnapObject) -> bool {
        let incoming = match PadAttributes::from_object(object) {
            Ok(incoming) => incoming,
            Err(err) => {
                log::warn!("Cannot update pad {}: {}", self.name(), err);
                return false;
            }
        };

        self.state.borrow_mut().attributes.update_from(&incoming);

        let Some(list) = incoming.primitives else {
            return false;
        };

        if self.is_canvas() {
            for object in &list.arr {
                self.check_special(object);
            }
        }

        let painters: Vec<(bool, PainterHandle)> = self
            .registry
            .borrow()
            .iter()
            .map(|(_, entry)| (entry.primitive, entry.painter.clone()))
            .collect();

        let mut any = false;
        let mut p = 0;
        for n in 0..list.len() {
            let Some((object, option)) = list.get(n) else {
                continue;
            };
            if SpecialObject::classify(object).is_some() {
                continue;
            }
            while p < painters.len() {
                let (primitive, painter) = &painters[p];
                p += 1;
                if !primitive {
                    continue;
                }
                if painter.update_object(object, option) {
                    any = true;
                }
                break;
            }
        }
        any
    }

    /// Painter with the given snapshot id anywhere below this pad.
    pub fn find_snap(self: &Rc<Self>, snap_id: &SnapId) -> Option<PainterHandle> {
        if self.snap_id().as_ref() == Some(snap_id) {
            return Some(PainterHandle::Pad(self.clone()));
        }
        for painter in self.painters() {
            let found = match &painter {
                PainterHandle::Pad(pad) => pad.find_snap(snap_id),
                PainterHandle::Object(_) => None,
            };
            if found.is_some() {
                return found;
            }
        }
        let registry = self.registry.borrow();
        registry
            .find_by_snap_id(snap_id)
            .and_then(|key| registry.get(key))
            .map(|entry| entry.painter.clone())
    }

    /// Object by name (and type) from the last snapshot, falling back to
    /// the pad's own primitive list.
    pub fn find_in_primitives(&self, name: &str, typename: Option<&str>) -> Option<SnapObject> {
        let matches = |object: &SnapObject| {
            object.name == name && typename.map_or(true, |typename| object.is(typename))
        };
        let state = self.state.borrow();
        let from_snap = state.snap_primitives.as_ref().and_then(|list| {
            list.iter()
                .filter(|snap| snap.kind == SnapshotKind::Object)
                .map(|snap| &snap.payload)
                .find(|object| matches(object))
        });
        from_snap
            .or_else(|| {
                state
                    .attributes
                    .primitives
                    .as_ref()
                    .and_then(|list| list.arr.iter().find(|object| matches(object)))
            })
            .cloned()
    }

    pub fn find_painter_for(
        &self,
        object: Option<&Rc<SnapObject>>,
        name: Option<&str>,
        typename: Option<&str>,
    ) -> Option<PainterHandle> {
        let registry = self.registry.borrow();
        registry
            .find_by_identity(object, name, typename)
            .and_then(|key| registry.get(key))
            .map(|entry| entry.painter.clone())
    }

    /// Direct sub-pad with the given pad number.
    pub fn sub_pad_painter(&self, number: i32) -> Option<Rc<PadPainter>> {
        self.painters()
            .into_iter()
            .filter_map(|painter| painter.as_pad().cloned())
            .find(|pad| pad.attributes().number == number)
    }

    pub fn for_each_painter(
        self: &Rc<Self>,
        scope: PainterScope,
        f: &mut dyn FnMut(&PainterHandle),
    ) {
        if scope != PainterScope::Objects {
            f(&PainterHandle::Pad(self.clone()));
        }
        for painter in self.painters() {
            match &painter {
                PainterHandle::Pad(pad) => {
                    if scope != PainterScope::Objects {
                        pad.for_each_painter(scope, f);
                    }
                }
                PainterHandle::Object(_) => {
                    if scope != PainterScope::Pads {
                        f(&painter);
                    }
                }
            }
        }
    }

    /// First pad of the tree flagged active by the server.
    pub fn find_active_pad(self: &Rc<Self>) -> Option<Rc<PadPainter>> {
        let mut active = None;
        self.for_each_painter(PainterScope::Pads, &mut |painter| {
            if let PainterHandle::Pad(pad) = painter {
                if active.is_none() && pad.is_active() {
                    active = Some(pad.clone());
                }
            }
        });
        active
    }

    /// First local drawing of the pad and its primitive list.
    pub fn draw(self: &Rc<Self>) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            this.check_specials_in_primitives(true);
            let show = if this.is_canvas() {
                this.create_canvas_surface(crate::geometry::SurfaceMode::Create, None);
                true
            } else {
                this.create_pad_surface(false)
            };
            if !this.is_batch() {
                this.add_pad_buttons(false);
            }
            if show {
                this.draw_primitives().await;
            }
            this.add_pad_interactive();
        })
    }

    /// Draw every entry of the pad's own primitive list in order.
    ///
    /// Runs as a forced queue entry so a redraw requested meanwhile waits
    /// for the first drawing to finish.
    pub fn draw_primitives(self: &Rc<Self>) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let count = this
                .attributes()
                .primitives
                .as_ref()
                .map_or(0, |list| list.len());
            this.state.borrow_mut().num_primitives = count;

            let Some(turn) = this.queue.sync_draw(DrawKind::Forced) else {
                return;
            };
            turn.ready().await;

            let dispatcher = this.ctx.dispatcher();
            for index in 0..count {
                let item = {
                    let state = this.state.borrow();
                    if state.specials.contains(&index) {
                        continue;
                    }
                    state
                        .attributes
                        .primitives
                        .as_ref()
                        .and_then(|list| list.get(index))
                        .map(|(object, option)| (object.clone(), option.to_string()))
                };
                let Some((object, option)) = item else {
                    break;
                };

                if index > 0 && object.is(class_names::FRAME) && this.frame_painter().is_some() {
                    continue;
                }

                if object.is_pad() {
                    this.draw_sub_pad(&object, &option).await;
                    continue;
                }

                if let Some(drawn) = dispatcher.draw_object(&this, Rc::new(object), &option).await {
                    this.add_drawn(drawn, None, true);
                }
            }

            this.queue.confirm_draw();
        })
    }

    /// Create, register and draw a sub-pad from a pad object.
    pub fn draw_sub_pad(
        self: &Rc<Self>,
        object: &SnapObject,
        option: &str,
    ) -> LocalBoxFuture<'static, Option<Rc<PadPainter>>> {
        let this = self.clone();
        let object = object.clone();
        let option = option.to_string();
        Box::pin(async move {
            let attributes = match PadAttributes::from_object(&object) {
                Ok(attributes) => attributes,
                Err(err) => {
                    log::warn!("Cannot draw sub-pad {}: {}", object.name, err);
                    return None;
                }
            };

            let sub = PadPainter::sub_pad(&this, attributes);
            sub.decode_options(&option);
            sub.state.borrow_mut().draw_disabled = disables_drawing(&object);
            this.add_painter(RegistryEntry::new(PainterHandle::Pad(sub.clone())).primitive());

            sub.create_pad_surface(false);
            if sub.attributes().typename == class_names::PAD && sub.has_objects_to_draw() {
                sub.add_pad_buttons(false);
            }
            this.ctx.set_active_pad(&sub);

            sub.draw_primitives().await;
            sub.add_pad_interactive();
            Some(sub)
        })
    }

    /// Replace the sub-pads by an `nx` by `ny` grid (`ny == 0` picks the
    /// grid from the count) and draw them. Returns the number of new pads.
    pub fn divide(self: &Rc<Self>, nx: u32, ny: u32) -> LocalBoxFuture<'static, usize> {
        let this = self.clone();
        Box::pin(async move {
            this.clean_primitives(|entry| entry.painter.is_pad());

            let pads = {
                let mut state = this.state.borrow_mut();
                let pads = state.attributes.divide(nx, ny, 0.01);
                let list = state.attributes.primitives.get_or_insert_with(Default::default);
                list.clear();
                for pad in &pads {
                    list.push(pad.to_object(), "");
                }
                state.specials.clear();
                pads
            };

            for pad in &pads {
                this.draw_sub_pad(&pad.to_object(), "").await;
            }
            pads.len()
        })
    }
}

fn disables_drawing(object: &SnapObject) -> bool {
    object
        .field("$disable_drawing")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Decode a `TColor` JSON record.
fn tcolor_entry(value: &Value) -> Option<ColorEntry> {
    let channel = |key: &str| -> Option<u8> {
        let v = value.get(key)?.as_f64()?;
        Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    };
    let index = value.get("fNumber")?.as_u64()? as u32;
    Some(ColorEntry {
        index,
        rgb: [channel("fRed")?, channel("fGreen")?, channel("fBlue")?],
        alpha: value
            .get("fAlpha")
            .and_then(Value::as_f64)
            .map(|a| a as f32),
    })
}
