//! Reconcile the painter tree with server snapshots.
//!
//! A snapshot lists the primitives of a pad in drawing order. Painters
//! whose snapshot id still appears at the same position are updated in
//! place; any divergence in order, or a painter without a counterpart,
//! tears the pad down and rebuilds it from the snapshot.

use crate::bridge::PadEventReason;
use crate::geometry::SurfaceMode;
use crate::pad::{Lifecycle, PadPainter};
use crate::queue::DrawKind;
use crate::registry::{PainterHandle, RegistryEntry};
use crate::{LocalBoxFuture, PadError};
use pad_model::{class_names, PadAttributes, SnapId};
use protocol::{SnapshotEntry, SnapshotKind};
use serde_json::Value;
use std::rc::Rc;

impl PadPainter {
    /// Apply a snapshot of the whole canvas.
    pub fn apply_snapshot(self: &Rc<Self>, snap: SnapshotEntry) -> LocalBoxFuture<'static, Result<(), PadError>> {
        if !self.is_canvas() {
            let name = self.name();
            return Box::pin(async move { Err(PadError::NotCanvas(name)) });
        }
        self.redraw_pad_snap(snap)
    }

    /// Apply a pad snapshot as a forced entry of this pad's draw queue.
    pub fn redraw_pad_snap(self: &Rc<Self>, snap: SnapshotEntry) -> LocalBoxFuture<'static, Result<(), PadError>> {
        let this = self.clone();
        Box::pin(async move {
            if this.lifecycle() == Lifecycle::Disposed {
                return Err(PadError::Disposed(this.name()));
            }
            let Some(turn) = this.queue.sync_draw(DrawKind::Forced) else {
                return Ok(());
            };
            turn.ready().await;
            let result = this.sync_snapshot(snap).await;
            this.queue.confirm_draw();

            if result.is_ok() {
                this.notify_canvas_updated();
            }
            result
        })
    }

    async fn sync_snapshot(self: &Rc<Self>, snap: SnapshotEntry) -> Result<(), PadError> {
        let Some(primitives) = snap.primitives.clone() else {
            log::debug!("Snapshot of {} carries no primitives", snap.object_id);
            return Ok(());
        };

        let mut incoming = PadAttributes::from_object(&snap.payload)?;
        incoming.primitives = None;

        let first_time = {
            let mut state = self.state.borrow_mut();
            state.active = snap.active.unwrap_or(false);
            state.read_only = snap.read_only.unwrap_or(false);
            state.has_execs = snap.has_execs.unwrap_or(false);
            state.deliver_move_events = incoming.execs_count() > 0;
            state.snap_primitives = Some(primitives.clone());
            state.snap_id.is_none()
        };
        if self.is_active() {
            self.ctx.set_active_pad(self);
        }

        if first_time {
            self.first_snapshot(snap.object_id.clone(), incoming, primitives).await;
            return Ok(());
        }

        self.state.borrow_mut().attributes.update_from(&incoming);
        if self.is_canvas() {
            self.create_canvas_surface(SurfaceMode::Force, None);
        } else {
            self.create_pad_surface(true);
        }

        let mismatch = !snap.without_primitives && self.snapshot_diverges(&primitives);
        if mismatch {
            log::debug!("Rebuilding pad {} from snapshot", self.name());
            let detached = self.registry.borrow_mut().clear();
            detached.cleanup();
            self.state.borrow_mut().buttons.clear();
            self.add_pad_buttons(true);
        }

        self.draw_snaps(primitives, if mismatch { None } else { Some(0) })
            .await;
        self.add_pad_interactive();

        if self.ctx.is_active_pad(self) {
            if let Some(canvas) = self.canvas_painter() {
                canvas.produce_pad_event(PadEventReason::PadRedraw, self, None);
            }
        }
        Ok(())
    }

    async fn first_snapshot(
        self: &Rc<Self>,
        snap_id: SnapId,
        mut attributes: PadAttributes,
        primitives: Vec<SnapshotEntry>,
    ) {
        let config = self.ctx.config().clone();
        if self.is_canvas() && config.batch && (attributes.cw == 0 || attributes.ch == 0) {
            attributes.cw = config.batch_size.0;
            attributes.ch = config.batch_size.1;
        }
        if self.is_canvas() && (attributes.cw == 0 || attributes.ch == 0) {
            self.set_fixed_size(false);
        }

        {
            let mut state = self.state.borrow_mut();
            state.snap_id = Some(snap_id);
            let options = state.options.clone();
            state.attributes = attributes;
            options.apply(&mut state.attributes, self.is_canvas());
        }

        let start = self.process_special_snaps(&primitives);
        if self.is_canvas() {
            self.create_canvas_surface(SurfaceMode::Create, None);
        } else {
            self.create_pad_surface(false);
        }
        if !config.batch {
            self.add_pad_buttons(true);
        }

        self.draw_snaps(primitives[start..].to_vec(), None).await;
        self.add_pad_interactive();
    }

    /// Compare the registry with the graphical entries of a snapshot.
    ///
    /// True when a snapshot id differs at some position or when registry
    /// entries are left without a counterpart.
    fn snapshot_diverges(&self, primitives: &[SnapshotEntry]) -> bool {
        let registry = self.registry.borrow();
        let mut i = 0;
        let mut k = 0;
        while k < registry.len() {
            let Some((_, entry)) = registry.at(k) else {
                break;
            };
            let Some(snap_id) = entry.snap_id.as_ref().filter(|_| !entry.is_secondary()) else {
                k += 1;
                continue;
            };
            let Some(prim) = primitives.get(i) else {
                log::debug!("Painter {} has no snapshot entry", snap_id);
                return true;
            };
            if !prim.kind.is_graphical() {
                i += 1;
                continue;
            }
            if &prim.object_id != snap_id {
                return true;
            }
            i += 1;
            k += 1;
        }
        false
    }

    /// Draw or update the entries of a primitive list in order.
    ///
    /// With `cursor` set, existing painters are located by walking the
    /// registry forward; with `None` every entry gets a new painter.
    pub fn draw_snaps(
        self: &Rc<Self>,
        list: Vec<SnapshotEntry>,
        mut cursor: Option<usize>,
    ) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            this.state.borrow_mut().num_primitives = list.len();

            for snap in &list {
                match snap.kind {
                    SnapshotKind::Style => {
                        this.ctx.merge_style(&snap.payload);
                        continue;
                    }
                    SnapshotKind::Colors => {
                        this.process_snap_colors(snap);
                        continue;
                    }
                    SnapshotKind::Font => {
                        this.process_snap_font(snap);
                        continue;
                    }
                    _ => {}
                }

                let is_sub_pad = snap.kind == SnapshotKind::SubPad;
                let found = match cursor.as_mut() {
                    Some(position) => this.locate_painter(snap, is_sub_pad, position),
                    None => None,
                };

                match found {
                    Some(PainterHandle::Pad(pad)) if is_sub_pad => {
                        if let Err(err) = pad.redraw_pad_snap(snap.clone()).await {
                            log::error!("Failed to update sub-pad {}: {}", snap.object_id, err);
                        }
                    }
                    Some(painter) => {
                        if matches!(snap.kind, SnapshotKind::Object | SnapshotKind::Svg)
                            && painter.update_object(&snap.payload, &snap.option)
                        {
                            painter.redraw(DrawKind::Redraw).await;
                        }
                    }
                    None if is_sub_pad => {
                        if let Some(position) = cursor.as_mut() {
                            *position += 1;
                        }
                        this.create_sub_pad_from_snap(snap).await;
                    }
                    None => {
                        if !matches!(snap.kind, SnapshotKind::Object | SnapshotKind::Svg)
                            || snap.is_ignored()
                        {
                            continue;
                        }
                        if let Some(position) = cursor.as_mut() {
                            *position += 1;
                        }
                        this.add_object_painter(snap).await;
                    }
                }
            }
        })
    }

    /// Walk the registry from `position` to the painter of `snap`.
    fn locate_painter(
        &self,
        snap: &SnapshotEntry,
        is_sub_pad: bool,
        position: &mut usize,
    ) -> Option<PainterHandle> {
        let registry = self.registry.borrow();
        while let Some((_, entry)) = registry.at(*position) {
            *position += 1;
            if entry.snap_id.as_ref() == Some(&snap.object_id) {
                return Some(entry.painter.clone());
            }
            if entry.snap_id.is_some() && !entry.is_secondary() && !is_sub_pad {
                log::warn!(
                    "Mismatch in snapid between painter {} ({}) and primitive {} kind {} ({})",
                    entry.snap_id.as_ref().map_or("", SnapId::as_str),
                    entry.painter.class_name(),
                    snap.object_id,
                    snap.kind,
                    snap.payload.typename
                );
                break;
            }
        }
        None
    }

    /// Draw a new object of a snapshot and register it with its
    /// secondaries under ids derived from the snapshot id.
    async fn add_object_painter(self: &Rc<Self>, snap: &SnapshotEntry) {
        let object = Rc::new(snap.payload.clone());
        let drawn = self
            .ctx
            .dispatcher()
            .draw_object(self, object, &snap.option)
            .await;
        match drawn {
            Some(drawn) => {
                self.add_drawn(drawn, Some(snap.object_id.clone()), false);
            }
            None => log::debug!(
                "No painter for {} ({})",
                snap.object_id,
                snap.payload.typename
            ),
        }
    }

    /// Create a sub-pad from its snapshot and draw its primitives.
    fn create_sub_pad_from_snap(self: &Rc<Self>, snap: &SnapshotEntry) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        let snap = snap.clone();
        Box::pin(async move {
            let mut attributes = match PadAttributes::from_object(&snap.payload) {
                Ok(attributes) => attributes,
                Err(err) => {
                    log::error!("Bad sub-pad snapshot {}: {}", snap.object_id, err);
                    return;
                }
            };
            attributes.primitives = None;
            let deliver_move_events = attributes.execs_count() > 0;

            let sub = PadPainter::sub_pad(&this, attributes);
            sub.decode_options(&snap.option);
            this.add_painter(
                RegistryEntry::new(PainterHandle::Pad(sub.clone()))
                    .with_snap_id(Some(snap.object_id.clone())),
            );

            let primitives = snap.primitives().to_vec();
            {
                let mut state = sub.state.borrow_mut();
                state.snap_id = Some(snap.object_id.clone());
                state.active = snap.active.unwrap_or(false);
                state.read_only = snap.read_only.unwrap_or(false);
                state.has_execs = snap.has_execs.unwrap_or(false);
                state.deliver_move_events = deliver_move_events;
                state.snap_primitives = Some(primitives.clone());
                state.draw_disabled = snap
                    .payload
                    .field("$disable_drawing")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
            }
            if sub.is_active() {
                this.ctx.set_active_pad(&sub);
            }

            let start = sub.process_special_snaps(&primitives);
            sub.create_pad_surface(false);
            if sub.class_name() == class_names::PAD && !primitives.is_empty() {
                sub.add_pad_buttons(true);
            }

            let Some(turn) = sub.queue.sync_draw(DrawKind::Forced) else {
                return;
            };
            turn.ready().await;
            sub.draw_snaps(primitives[start..].to_vec(), None).await;
            sub.queue.confirm_draw();
            sub.add_pad_interactive();
        })
    }

    /// Apply the style, color and font entries at the head of a list.
    /// Returns the number of entries consumed.
    pub fn process_special_snaps(&self, list: &[SnapshotEntry]) -> usize {
        let mut consumed = 0;
        for snap in list {
            match snap.kind {
                SnapshotKind::Style => self.ctx.merge_style(&snap.payload),
                SnapshotKind::Colors => self.process_snap_colors(snap),
                SnapshotKind::Font => self.process_snap_font(snap),
                _ => break,
            }
            consumed += 1;
        }
        consumed
    }

    /// Apply a color table entry according to the pad options.
    pub fn process_snap_colors(&self, snap: &SnapshotEntry) {
        let table = match snap.color_table() {
            Ok(table) => table,
            Err(err) => {
                log::warn!("Cannot decode colors of {}: {}", self.name(), err);
                return;
            }
        };
        let options = self.options();
        let grayscale = self.is_grayscale();

        if options.global_colors {
            self.ctx.colors_mut().adopt(&table.colors);
        }

        let extended = self.ctx.colors().extended(&table.colors, false);
        let mut colors = self.colors.borrow_mut();
        colors.custom_colors = options.local_colors.then(|| {
            if grayscale {
                extended.to_grayscale()
            } else {
                extended.clone()
            }
        });

        match table.palette {
            Some(indexes) if !options.ignore_palette => {
                colors.set_palette_indexes(indexes, &extended, grayscale);
            }
            _ => colors.clear_palette(),
        }
    }

    pub fn process_snap_font(&self, snap: &SnapshotEntry) {
        match snap.font_spec() {
            Ok(spec) => {
                self.ctx.fonts_mut().register(spec);
            }
            Err(err) => log::warn!("Cannot decode font of {}: {}", self.name(), err),
        }
    }
}
