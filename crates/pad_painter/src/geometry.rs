//! Pixel geometry of pads: surface creation, resize handling and the
//! enlarge toggle.

use crate::bridge::PadEventReason;
use crate::pad::{CanvasState, Lifecycle, PadPainter, PainterScope, Surface};
use crate::queue::DrawKind;
use crate::registry::PainterHandle;
use crate::LocalBoxFuture;
use glam::Vec2;
use pad_model::{PixelRect, SnapId};
use std::rc::Rc;
use strum_macros::Display;

/// How a canvas surface is (re)built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SurfaceMode {
    /// First creation.
    Create,
    /// Rebuild only if the measured size changed.
    Check,
    /// Rebuild unconditionally.
    Force,
}

impl PadPainter {
    /// Measure the host and size the canvas surface.
    ///
    /// Returns true when the surface was (re)built. With a fixed-size
    /// canvas only [`SurfaceMode::Force`] reports a change.
    pub fn create_canvas_surface(&self, mode: SurfaceMode, new_size: Option<Vec2>) -> bool {
        let Some(canvas) = &self.canvas else {
            return false;
        };
        let config = self.ctx.config().clone();

        let (declared, current) = {
            let state = self.state.borrow();
            let attrs = &state.attributes;
            ((attrs.cw, attrs.ch), state.surface)
        };

        let mut factor = config.aspect_factor;
        if declared.0 > 0 && declared.1 > 0 {
            let ratio = declared.1 as f64 / declared.0 as f64;
            if (0.1..=10.0).contains(&ratio) {
                factor = ratio;
            }
        }

        if mode != SurfaceMode::Create {
            if canvas.fixed_size.get() {
                return mode == SurfaceMode::Force;
            }
            if self.lifecycle() != Lifecycle::Ready {
                return false;
            }
            factor = current.height_factor;
        }

        let measured = if canvas.fixed_size.get() && declared.0 > 0 && declared.1 > 0 {
            Vec2::new(declared.0 as f32, declared.1 as f32)
        } else {
            measure_canvas(canvas, new_size, factor)
        };

        let scale = config.scale;
        if mode == SurfaceMode::Check && measured * scale == current.rect.size {
            return false;
        }

        let mut visible = true;
        let size = if measured.x <= config.min_size || measured.y <= config.min_size {
            if self.snap_id().is_none() {
                visible = false;
                log::warn!(
                    "Hide canvas while geometry too small w={} h={}",
                    measured.x,
                    measured.y
                );
            }
            canvas.last_size.get().unwrap_or(config.fallback_size)
        } else {
            canvas.last_size.set(Some(measured));
            measured
        };

        {
            let mut state = self.state.borrow_mut();
            state.surface = Surface {
                rect: PixelRect::from_size(size * scale),
                visible,
                height_factor: factor,
                scale,
            };
            state.lifecycle = Lifecycle::Ready;
        }
        log::debug!("Canvas {} surface {} at {}x{}", self.name(), mode, size.x, size.y);

        self.set_grayscale(None);
        true
    }

    /// Position the pad inside its parent. Returns whether the pad is
    /// visible.
    ///
    /// An enlarged pad covers the whole canvas and hides every pad that is
    /// not inside it.
    pub fn create_pad_surface(&self, only_resize: bool) -> bool {
        if self.is_canvas() {
            let mode = if only_resize {
                SurfaceMode::Force
            } else {
                SurfaceMode::Create
            };
            self.create_canvas_surface(mode, None);
            return self.is_visible();
        }

        let (Some(parent), Some(canvas)) = (self.parent(), self.canvas_painter()) else {
            log::warn!("Pad {} has no canvas", self.name());
            return false;
        };

        let enlarged = canvas
            .canvas
            .as_ref()
            .and_then(|state| state.enlarged.borrow().upgrade());
        let parent_rect = parent.pad_rect();

        let mut state = self.state.borrow_mut();
        let is_enlarged = enlarged
            .as_ref()
            .is_some_and(|pad| std::ptr::eq(Rc::as_ptr(pad), self));
        let rect = if is_enlarged {
            canvas.pad_rect()
        } else {
            state.attributes.ndc().to_pixels(parent_rect)
        };

        let visible = !state.draw_disabled
            && enlarged.as_ref().map_or(true, |pad| self.is_within(pad));

        state.surface = Surface {
            rect,
            visible,
            height_factor: if rect.width() > 0.0 {
                (rect.height() / rect.width()) as f64
            } else {
                state.surface.height_factor
            },
            scale: canvas.surface().scale,
        };
        state.lifecycle = Lifecycle::Ready;
        visible
    }

    /// True if any painter wants a full redraw after a size change.
    pub fn need_redraw_by_resize(&self) -> bool {
        self.painters()
            .iter()
            .any(|painter| painter.need_redraw_by_resize())
    }

    /// React to a size change of the canvas host.
    ///
    /// Coalesces with other pending resize checks. When the surface
    /// changed, painters are redrawn one after another and, online and not
    /// in batch mode, the server is told about the new size after the
    /// resize delay. Returns whether the surface changed.
    pub fn check_resize(self: &Rc<Self>, size: Option<Vec2>, force: bool) -> LocalBoxFuture<'static, bool> {
        if !self.is_canvas() {
            return match self.canvas_painter() {
                Some(canvas) => canvas.check_resize(size, force),
                None => Box::pin(async { false }),
            };
        }

        let this = self.clone();
        Box::pin(async move {
            if this.canvas.as_ref().is_some_and(|canvas| canvas.ignore_resize.get()) {
                return false;
            }
            let Some(turn) = this.queue.sync_draw(DrawKind::CanvasResize) else {
                return false;
            };
            turn.ready().await;

            let force = force || this.need_redraw_by_resize();
            let mode = if force {
                SurfaceMode::Force
            } else {
                SurfaceMode::Check
            };
            let changed = this.create_canvas_surface(mode, size);

            if changed && this.is_online() && !this.is_batch() {
                this.schedule_resized();
            }

            if changed {
                let kind = if force {
                    DrawKind::Redraw
                } else {
                    DrawKind::Resize
                };
                for painter in this.painters() {
                    painter.redraw(kind).await;
                }
            }

            this.queue.confirm_draw();
            changed
        })
    }

    /// Tell the server about the new size once resizing settles. A newer
    /// call replaces a pending one.
    fn schedule_resized(self: &Rc<Self>) {
        let Some(canvas) = &self.canvas else {
            return;
        };
        let generation = canvas.resize_generation.get() + 1;
        canvas.resize_generation.set(generation);

        let delay = self.ctx.config().resize_delay;
        let weak = Rc::downgrade(self);
        self.ctx.spawn(async move {
            smol::Timer::after(delay).await;
            let Some(pad) = weak.upgrade() else {
                return;
            };
            let current = pad
                .canvas
                .as_ref()
                .map(|canvas| canvas.resize_generation.get());
            if current == Some(generation) {
                pad.send_resized();
            }
        });
    }

    /// Whether this pad currently covers the canvas.
    pub fn is_enlarged(&self) -> bool {
        let Some(canvas) = self.canvas_painter() else {
            return false;
        };
        let Some(state) = canvas.canvas.as_ref() else {
            return false;
        };
        if self.is_canvas() {
            return state.viewport_enlarged.get();
        }
        let enlarged = state.enlarged.borrow().upgrade();
        enlarged.is_some_and(|pad| std::ptr::eq(Rc::as_ptr(&pad), self))
    }

    pub fn enlarged_pad(&self) -> Option<Rc<PadPainter>> {
        let canvas = self.canvas_painter()?;
        let state = canvas.canvas.as_ref()?;
        let pad = state.enlarged.borrow().upgrade();
        pad
    }

    /// Toggle enlargement of this pad. Refused on fixed-size canvases and
    /// while another pad is enlarged. Resolves to whether the toggle was
    /// applied.
    pub fn enlarge_pad(self: &Rc<Self>) -> LocalBoxFuture<'static, bool> {
        let this = self.clone();
        Box::pin(async move {
            let Some(canvas) = this.canvas_painter() else {
                return false;
            };
            let Some(state) = canvas.canvas.as_ref() else {
                return false;
            };
            if state.fixed_size.get() {
                log::debug!("Cannot enlarge pad {} of fixed-size canvas", this.name());
                return false;
            }

            if this.is_canvas() {
                let on = !state.viewport_enlarged.get();
                if !state.host.enlarge(on) {
                    return false;
                }
                state.viewport_enlarged.set(on);
            } else {
                let current = state.enlarged.borrow().upgrade();
                match current {
                    None => {
                        *state.enlarged.borrow_mut() = Rc::downgrade(&this);
                        this.ctx.set_active_pad(&this);
                    }
                    Some(pad) if Rc::ptr_eq(&pad, &this) => {
                        *state.enlarged.borrow_mut() = std::rc::Weak::new();
                    }
                    Some(pad) => {
                        log::warn!("Pad {} is already enlarged", pad.name());
                        return false;
                    }
                }
            }

            canvas.check_resize(None, true).await;
            canvas.refresh_pad_surfaces();
            true
        })
    }

    /// Recompute the rect of every sub-pad in the tree, parents first.
    /// Sub-pad redraws run detached, so callers that need the new geometry
    /// right away use this.
    pub fn refresh_pad_surfaces(self: &Rc<Self>) {
        self.for_each_painter(PainterScope::Pads, &mut |painter| {
            if let PainterHandle::Pad(pad) = painter {
                if !pad.is_canvas() {
                    pad.create_pad_surface(true);
                }
            }
        });
    }

    /// Redraw detached on the pad executor.
    pub fn redraw(&self, kind: DrawKind) {
        if let Some(this) = self.this() {
            self.ctx.spawn(async move {
                this.redraw_pad(kind).await;
            });
        }
    }

    /// Rebuild the pad surface and redraw its painters in order. Resolves
    /// to false when an equivalent redraw was already pending.
    pub fn redraw_pad(self: &Rc<Self>, kind: DrawKind) -> LocalBoxFuture<'static, bool> {
        let this = self.clone();
        Box::pin(async move {
            let Some(turn) = this.queue.sync_draw(kind) else {
                log::debug!("Prevent redrawing of {}", this.name());
                return false;
            };
            turn.ready().await;

            let show_sub_items = if this.is_canvas() {
                this.create_canvas_surface(SurfaceMode::Force, None);
                true
            } else {
                this.create_pad_surface(true)
            };

            for painter in this.painters() {
                if show_sub_items || painter.is_pad() {
                    painter.redraw(kind).await;
                }
            }

            this.add_pad_interactive();
            this.queue.confirm_draw();

            if this.ctx.is_active_pad(&this) {
                if let Some(canvas) = this.canvas_painter() {
                    canvas.produce_pad_event(PadEventReason::PadRedraw, &this, None);
                }
            }
            true
        })
    }

    /// Stop drawing into this pad; it stays hidden until the next snapshot
    /// recreates it.
    pub fn disable_pad_drawing(&self) {
        let mut state = self.state.borrow_mut();
        state.draw_disabled = true;
        if !self.is_canvas() {
            state.surface.visible = false;
        }
    }

    /// Snapshot id of the pad or, for `None`, of the canvas.
    pub(crate) fn snap_id_or_canvas(&self) -> Option<SnapId> {
        self.snap_id()
            .or_else(|| self.canvas_painter().and_then(|canvas| canvas.snap_id()))
    }
}

fn measure_canvas(canvas: &CanvasState, new_size: Option<Vec2>, factor: f64) -> Vec2 {
    let mut size = new_size
        .filter(|size| size.x > 0.0 && size.y > 0.0)
        .or_else(|| canvas.host.measure())
        .unwrap_or(Vec2::ZERO);
    if size.x > 0.0 && size.y < 10.0 {
        size.y = (size.x as f64 * factor).round() as f32;
    }
    size
}
