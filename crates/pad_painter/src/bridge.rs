//! User interaction: toolbar buttons, context menus, pad edits, pad events
//! and messages to the remote peer.
//!
//! Local edits always apply and redraw at once; the matching exec command
//! is sent to the server only when the canvas is online.

use crate::pad::{PadEventReceiver, PadPainter};
use crate::painter::ObjectPainter;
use crate::queue::DrawKind;
use crate::registry::PainterHandle;
use crate::LocalBoxFuture;
use pad_model::{class_names, parse_division, Margins, NdcRect, SnapId, SnapObject};
use protocol::{
    ImageFormat, Outbound, PadEventKind, PadRanges, SaveRequest, WebObjectOptions, WebPadOptions,
};
use serde_json::{json, Value};
use std::rc::Rc;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Named toolbar actions handled by the pad itself. Other names are
/// broadcast to sub-pads and painters.
#[derive(Clone, Debug, PartialEq, Eq, EnumString)]
pub enum ButtonAction {
    CanvasSnapShot,
    PadSnapShot,
    #[strum(serialize = "enlargePad")]
    EnlargePad,
    PadContextMenus,
    #[strum(default)]
    Other(String),
}

impl ButtonAction {
    pub fn parse(name: &str) -> Self {
        Self::from_str(name).unwrap_or_else(|_| Self::Other(name.to_string()))
    }
}

/// Result of a toolbar click.
#[derive(Clone, Debug, PartialEq)]
pub enum ButtonOutcome {
    Saved(SaveRequest),
    Enlarged(bool),
    ContextMenu(Vec<MenuEntry>),
    /// Some child or painter handled the action.
    Handled,
    Unhandled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PadButton {
    pub name: String,
    pub tooltip: String,
    pub key: Option<String>,
}

/// Pad attribute edits available from the context menu.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PadEdit {
    GridX(bool),
    GridY(bool),
    TickX(i32),
    TickY(i32),
    LogX(i32),
    LogY(i32),
    LogZ(i32),
    Editable(bool),
    /// Canvas only.
    Grayscale(bool),
    BorderMode(i32),
    BorderSize(i32),
    Margins(Margins),
}

impl PadEdit {
    /// Server-side setter call reproducing the edit.
    pub fn exec(&self) -> String {
        match self {
            Self::GridX(on) => format!("SetGridx({})", *on as i32),
            Self::GridY(on) => format!("SetGridy({})", *on as i32),
            Self::TickX(value) => format!("SetTickx({})", value),
            Self::TickY(value) => format!("SetTicky({})", value),
            Self::LogX(value) => format!("SetLogx({})", value),
            Self::LogY(value) => format!("SetLogy({})", value),
            Self::LogZ(value) => format!("SetLogz({})", value),
            Self::Editable(on) => format!("SetEditable({})", on),
            Self::Grayscale(on) => format!("SetGrayscale({})", on),
            Self::BorderMode(value) => format!("SetBorderMode({})", value),
            Self::BorderSize(value) => format!("SetBorderSize({})", value),
            Self::Margins(m) => format!("SetMargin({},{},{},{})", m.left, m.right, m.bottom, m.top),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MenuCommand {
    Edit(PadEdit),
    BuildLegend,
    /// Columns and rows; `(0, 0)` removes the division.
    Divide(u32, u32),
    SaveStyle,
    Enlarge,
    SaveAs(ImageFormat),
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuEntry {
    Header(String),
    Separator,
    Item {
        label: String,
        checked: Option<bool>,
        command: MenuCommand,
    },
    Sub {
        label: String,
        entries: Vec<MenuEntry>,
    },
}

impl MenuEntry {
    fn item(label: impl Into<String>, command: MenuCommand) -> Self {
        Self::Item {
            label: label.into(),
            checked: None,
            command,
        }
    }

    fn check(label: impl Into<String>, checked: bool, command: MenuCommand) -> Self {
        Self::Item {
            label: label.into(),
            checked: Some(checked),
            command,
        }
    }

    /// Command of the item at `path`, with sub-menu labels separated by
    /// `/`, e.g. `"Divide/2x2"`.
    pub fn find(entries: &[MenuEntry], path: &str) -> Option<MenuCommand> {
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        entries.iter().find_map(|entry| match (entry, rest) {
            (Self::Item { label, command, .. }, None) if label == head => Some(*command),
            (Self::Sub { label, entries }, Some(rest)) if label == head => Self::find(entries, rest),
            _ => None,
        })
    }
}

/// Which pads `get_web_pad_options` covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionsScope {
    /// Whole tree; nothing for a read-only canvas.
    Full,
    OnlyThis,
    WithSubpads,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PadEventReason {
    Select,
    PadRedraw,
    Redraw,
}

#[derive(Clone)]
pub struct PadEvent {
    pub reason: PadEventReason,
    pub pad: Rc<PadPainter>,
    pub painter: Option<PainterHandle>,
}

const DIVISIONS: [&str; 7] = ["1x2", "2x1", "2x2", "2x3", "3x2", "3x3", "4x4"];

impl PadPainter {
    pub fn buttons(&self) -> Vec<PadButton> {
        self.state.borrow().buttons.clone()
    }

    /// Add a toolbar button once. Buttons of sub-pads also appear on the
    /// canvas unless they only make sense for the pad itself.
    pub fn add_pad_button(&self, name: &str, tooltip: &str, key: Option<&str>) {
        let config = self.ctx.config();
        if !config.toolbar || config.batch {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            if state.buttons.iter().any(|button| button.name == name) {
                return;
            }
            state.buttons.push(PadButton {
                name: name.to_string(),
                tooltip: tooltip.to_string(),
                key: key.map(str::to_string),
            });
        }

        if !self.is_canvas() && !name.starts_with("Pad") && name != "enlargePad" {
            if let Some(canvas) = self.canvas_painter() {
                canvas.add_pad_button(name, tooltip, key);
            }
        }
    }

    /// Standard buttons of a pad.
    pub fn add_pad_buttons(&self, is_online: bool) {
        if self.is_canvas() {
            self.add_pad_button("CanvasSnapShot", "Create PNG", Some("Ctrl PrintScreen"));
        } else {
            self.add_pad_button("PadSnapShot", "Create PNG", None);
        }
        if self.ctx.config().context_menu {
            self.add_pad_button("PadContextMenus", "Toggle context menu", Some("Ctrl Alt M"));
        }
        let can_enlarge = if self.is_canvas() {
            !self.is_fixed_size()
        } else {
            self.has_objects_to_draw()
        };
        if can_enlarge {
            self.add_pad_button("enlargePad", "Enlarge pad", Some("F11"));
        }
        if is_online && self.is_canvas() {
            self.add_pad_button("ToggleGed", "Toggle Ged", None);
            self.add_pad_button("ToggleStatus", "Toggle status", None);
        }
    }

    /// Announce the pad area to the host for mouse handling.
    pub fn add_pad_interactive(&self) {
        if self.is_batch() || !self.is_visible() {
            return;
        }
        if let Some(host) = self.host() {
            host.attach_interactive(&self.name(), self.pad_rect());
        }
    }

    pub fn click_button(self: &Rc<Self>, action: &str) -> LocalBoxFuture<'static, ButtonOutcome> {
        let this = self.clone();
        let action = ButtonAction::parse(action);
        Box::pin(async move {
            match action {
                ButtonAction::CanvasSnapShot => {
                    ButtonOutcome::Saved(this.save_as(ImageFormat::Png, true, None))
                }
                ButtonAction::PadSnapShot => {
                    ButtonOutcome::Saved(this.save_as(ImageFormat::Png, false, None))
                }
                ButtonAction::EnlargePad => ButtonOutcome::Enlarged(this.enlarge_pad().await),
                ButtonAction::PadContextMenus => ButtonOutcome::ContextMenu(this.context_menu()),
                ButtonAction::Other(name) => {
                    let mut handled = false;
                    for painter in this.painters() {
                        match painter {
                            PainterHandle::Pad(pad) => {
                                if pad.click_button(&name).await != ButtonOutcome::Unhandled {
                                    handled = true;
                                }
                            }
                            PainterHandle::Object(painter) => {
                                if handled {
                                    continue;
                                }
                                if let Some(done) = painter.click_button(&name) {
                                    done.await;
                                    handled = true;
                                }
                            }
                        }
                    }
                    if handled {
                        ButtonOutcome::Handled
                    } else {
                        ButtonOutcome::Unhandled
                    }
                }
            }
        })
    }

    /// Export the pad (or the whole canvas). PDF and JSON are produced by
    /// the server when online; everything else by the host.
    pub fn save_as(&self, format: ImageFormat, full_canvas: bool, filename: Option<&str>) -> SaveRequest {
        let source = if full_canvas {
            self.canvas_painter()
        } else {
            self.this()
        };
        let name = source.as_ref().map_or_else(|| self.name(), |pad| pad.name());
        let snapid = if full_canvas {
            String::new()
        } else {
            self.snap_id().map(|id| id.to_string()).unwrap_or_default()
        };
        let request = SaveRequest {
            format,
            snapid,
            filename: filename.map_or_else(|| format!("{}.{}", name, format), str::to_string),
        };

        let remote = matches!(format, ImageFormat::Pdf | ImageFormat::Json) && self.is_online();
        if !(remote && self.send(Outbound::Save(request.clone()))) {
            if let Some(host) = self.host() {
                host.export(&request);
            }
        }
        request
    }

    /// Apply an edit locally, then redraw and notify the server.
    pub fn apply_edit(self: &Rc<Self>, edit: PadEdit) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            if let PadEdit::Grayscale(flag) = edit {
                match this.canvas_painter() {
                    Some(canvas) => canvas.set_grayscale(Some(flag)),
                    None => return,
                }
            } else {
                this.with_attributes_mut(|attrs| match edit {
                    PadEdit::GridX(on) => attrs.gridx = on as i32,
                    PadEdit::GridY(on) => attrs.gridy = on as i32,
                    PadEdit::TickX(value) => attrs.tickx = value,
                    PadEdit::TickY(value) => attrs.ticky = value,
                    PadEdit::LogX(value) => attrs.logx = value,
                    PadEdit::LogY(value) => attrs.logy = value,
                    PadEdit::LogZ(value) => attrs.logz = value,
                    PadEdit::Editable(on) => attrs.editable = on,
                    PadEdit::BorderMode(value) => attrs.border_mode = value,
                    PadEdit::BorderSize(value) => attrs.border_size = value,
                    PadEdit::Margins(margins) => attrs.set_margins(margins),
                    PadEdit::Grayscale(_) => {}
                });
            }
            this.interactive_redraw(None, Some(edit.exec())).await;
        })
    }

    /// Redraw after a local change: the pad for `None`, otherwise the given
    /// painter. In online mode `exec` is forwarded as `OBJEXEC`.
    pub fn interactive_redraw(
        self: &Rc<Self>,
        target: Option<PainterHandle>,
        exec: Option<String>,
    ) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            let snap_id = match &target {
                None => this.snap_id_or_canvas(),
                Some(painter) => this.snap_id_of(painter),
            };

            match &target {
                None => {
                    this.redraw_pad(DrawKind::Redraw).await;
                }
                Some(painter) => painter.redraw(DrawKind::Redraw).await,
            }
            if let Some(canvas) = this.canvas_painter() {
                canvas.produce_pad_event(PadEventReason::Redraw, &this, target);
            }

            let (Some(exec), Some(snap_id)) = (exec, snap_id) else {
                return;
            };
            if this.is_online() && !this.is_read_only() {
                let exec = exec.strip_prefix("exec:").unwrap_or(&exec);
                this.send(Outbound::obj_exec(&snap_id, exec));
            }
        })
    }

    fn snap_id_of(&self, painter: &PainterHandle) -> Option<SnapId> {
        let registry = self.registry.borrow();
        let snap_id = registry
            .iter()
            .find(|(_, entry)| entry.painter.ptr_eq(painter))
            .and_then(|(_, entry)| entry.snap_id.clone());
        snap_id
    }

    /// Context menu of the pad.
    pub fn context_menu(&self) -> Vec<MenuEntry> {
        let attrs = self.attributes().clone();
        let is_canvas = self.is_canvas();
        let offline = !self.is_online();
        let mut menu = vec![MenuEntry::Header(format!("{}::{}", attrs.typename, attrs.name))];

        menu.push(MenuEntry::check(
            "Grid x",
            attrs.gridx != 0,
            MenuCommand::Edit(PadEdit::GridX(attrs.gridx == 0)),
        ));
        menu.push(MenuEntry::check(
            "Grid y",
            attrs.gridy != 0,
            MenuCommand::Edit(PadEdit::GridY(attrs.gridy == 0)),
        ));
        let ticks = |current: i32, edit: fn(i32) -> PadEdit| -> Vec<MenuEntry> {
            (0..3)
                .map(|value| {
                    MenuEntry::check(value.to_string(), current == value, MenuCommand::Edit(edit(value)))
                })
                .collect()
        };
        menu.push(MenuEntry::Sub {
            label: "Ticks x".to_string(),
            entries: ticks(attrs.tickx, PadEdit::TickX),
        });
        menu.push(MenuEntry::Sub {
            label: "Ticks y".to_string(),
            entries: ticks(attrs.ticky, PadEdit::TickY),
        });
        menu.push(MenuEntry::check(
            "Editable",
            attrs.editable,
            MenuCommand::Edit(PadEdit::Editable(!attrs.editable)),
        ));
        if is_canvas {
            let gray = attrs.is_grayscale();
            menu.push(MenuEntry::check(
                "Gray scale",
                gray,
                MenuCommand::Edit(PadEdit::Grayscale(!gray)),
            ));
        }

        let border_modes: Vec<MenuEntry> = [(-1, "Sunken"), (0, "No border"), (1, "Raised")]
            .into_iter()
            .map(|(mode, label)| {
                MenuEntry::check(label, attrs.border_mode == mode, MenuCommand::Edit(PadEdit::BorderMode(mode)))
            })
            .collect();
        let border_sizes: Vec<MenuEntry> = (0..=5)
            .map(|size| {
                MenuEntry::check(
                    size.to_string(),
                    attrs.border_size == size,
                    MenuCommand::Edit(PadEdit::BorderSize(size)),
                )
            })
            .collect();
        menu.push(MenuEntry::Sub {
            label: "Border".to_string(),
            entries: vec![
                MenuEntry::Sub {
                    label: "Mode".to_string(),
                    entries: border_modes,
                },
                MenuEntry::Sub {
                    label: "Size".to_string(),
                    entries: border_sizes,
                },
            ],
        });

        if offline {
            menu.push(MenuEntry::Separator);
            menu.push(MenuEntry::item("Build legend", MenuCommand::BuildLegend));
            let mut divisions: Vec<MenuEntry> = DIVISIONS
                .iter()
                .filter_map(|label| {
                    let (nx, ny) = parse_division(label).ok()?;
                    Some(MenuEntry::item(*label, MenuCommand::Divide(nx, ny)))
                })
                .collect();
            divisions.push(MenuEntry::item("0", MenuCommand::Divide(0, 0)));
            menu.push(MenuEntry::Sub {
                label: "Divide".to_string(),
                entries: divisions,
            });
            menu.push(MenuEntry::item("Save to gStyle", MenuCommand::SaveStyle));
        }

        menu.push(MenuEntry::Separator);
        menu.push(MenuEntry::check("Enlarge", self.is_enlarged(), MenuCommand::Enlarge));

        let mut formats = vec![ImageFormat::Svg, ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Webp];
        if is_canvas {
            formats.push(ImageFormat::Json);
        }
        menu.push(MenuEntry::Sub {
            label: "Save as".to_string(),
            entries: formats
                .into_iter()
                .map(|format| {
                    MenuEntry::item(format!("{}.{}", attrs.name, format), MenuCommand::SaveAs(format))
                })
                .collect(),
        });
        menu
    }

    pub fn run_menu_command(self: &Rc<Self>, command: MenuCommand) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            match command {
                MenuCommand::Edit(edit) => this.apply_edit(edit).await,
                MenuCommand::BuildLegend => {
                    this.add_legend().await;
                }
                MenuCommand::Divide(nx, ny) => {
                    this.divide(nx, ny).await;
                }
                MenuCommand::SaveStyle => {
                    let attrs = this.attributes().clone();
                    this.ctx.style_mut().save_pad(&attrs, this.is_canvas());
                }
                MenuCommand::Enlarge => {
                    this.enlarge_pad().await;
                }
                MenuCommand::SaveAs(format) => {
                    this.save_as(format, this.is_canvas(), None);
                }
            }
        })
    }

    /// Legend for the drawn objects of the pad, placed in the upper right
    /// corner of the frame. `None` when nothing qualifies.
    pub fn build_legend(&self) -> Option<SnapObject> {
        let entries: Vec<Value> = self
            .painters()
            .iter()
            .filter_map(PainterHandle::as_object)
            .filter_map(|painter| legend_entry(&**painter))
            .collect();
        if entries.is_empty() {
            return None;
        }

        let margins = self.attributes().margins();
        let szx = 0.4;
        let szy = 0.1 * entries.len().min(8) as f64;
        let x1 = szx * margins.left + (1.0 - szx) * (1.0 - margins.right);
        let y1 = (1.0 - szy) * (1.0 - margins.top) + szy * margins.bottom;
        let x2 = 0.99 - margins.right;
        let y2 = 0.99 - margins.top;

        Some(
            SnapObject::new(class_names::LEGEND, "")
                .with_field("fX1NDC", x1)
                .with_field("fY1NDC", y1)
                .with_field("fX2NDC", x2)
                .with_field("fY2NDC", y2)
                .with_field("fOption", "autoplace")
                .with_field(
                    "fPrimitives",
                    json!({ "_typename": class_names::LIST, "arr": entries }),
                ),
        )
    }

    /// Build a legend and draw it as a new primitive of the pad.
    pub fn add_legend(self: &Rc<Self>) -> LocalBoxFuture<'static, bool> {
        let this = self.clone();
        Box::pin(async move {
            let Some(legend) = this.build_legend() else {
                log::debug!("No entries for a legend in {}", this.name());
                return false;
            };
            this.with_attributes_mut(|attrs| {
                attrs
                    .primitives
                    .get_or_insert_with(Default::default)
                    .push(legend.clone(), "");
            });
            let drawn = this
                .ctx
                .dispatcher()
                .draw_object(&this, Rc::new(legend), "")
                .await;
            match drawn {
                Some(drawn) => {
                    this.add_drawn(drawn, None, true);
                    true
                }
                None => false,
            }
        })
    }

    /// Forward a mouse event on this pad to the server. Returns whether a
    /// message was sent.
    pub fn deliver_event(&self, kind: PadEventKind, x: f64, y: f64, target: Option<SnapId>) -> bool {
        let read_only = self
            .canvas_painter()
            .map_or(true, |canvas| canvas.is_read_only());
        if !self.is_active() || self.doing_draw() || read_only {
            return false;
        }
        if kind == PadEventKind::Move && !self.delivers_move_events() {
            return false;
        }
        let Some(pad) = self.snap_id() else {
            return false;
        };
        self.send(Outbound::Event {
            pad,
            kind,
            x,
            y,
            target,
        })
    }

    /// Encode and send a message if the transport accepts it now.
    pub(crate) fn send(&self, message: Outbound) -> bool {
        let Some(transport) = self.transport() else {
            return false;
        };
        if !transport.can_send(message.credits()) {
            log::debug!("Transport busy, dropping {}", message.prefix());
            return false;
        }
        match message.encode() {
            Ok(text) => {
                transport.send(&text);
                true
            }
            Err(err) => {
                log::error!("Cannot encode {} message: {}", message.prefix(), err);
                false
            }
        }
    }

    pub fn send_resized(&self) -> bool {
        let options = self.get_web_pad_options(OptionsScope::OnlyThis);
        self.send(Outbound::Resized(options))
    }

    pub fn send_options(&self) -> bool {
        let options = self.get_web_pad_options(OptionsScope::Full);
        self.send(Outbound::Options(options))
    }

    /// Current view state of the pad tree for the server to store.
    pub fn get_web_pad_options(&self, scope: OptionsScope) -> Vec<WebPadOptions> {
        let read_only_top = self
            .canvas_painter()
            .is_some_and(|canvas| canvas.is_read_only());
        if scope == OptionsScope::Full && read_only_top {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.collect_web_options(scope, &mut out);
        out
    }

    fn collect_web_options(&self, scope: OptionsScope, out: &mut Vec<WebPadOptions>) {
        let Some(snap_id) = self.snap_id() else {
            return;
        };
        let attrs = self.attributes().clone();
        let mut options = WebPadOptions::from_pad(&snap_id, self.is_active(), &attrs);
        options.bits = attrs.bits;

        let rect = self.pad_rect();
        if self.is_canvas() {
            options.cw = rect.width().round() as u32;
            options.ch = rect.height().round() as u32;
            options.w = vec![0, 0, options.cw as i32, options.ch as i32];
        } else if let Some(canvas) = self.canvas_painter() {
            let ndc = NdcRect::from_pixels(rect, canvas.pad_rect());
            options.xlow = ndc.xlow;
            options.ylow = ndc.ylow;
            options.xup = ndc.xup();
            options.yup = ndc.yup();
        }
        options.ranges = self.pad_ranges();

        let mut sub_pads = Vec::new();
        for (snap, painter) in self.snap_painters() {
            match painter {
                PainterHandle::Pad(pad) => sub_pads.push(pad),
                PainterHandle::Object(painter) => {
                    let mut web = WebObjectOptions::new(&snap, painter.draw_option());
                    painter.fill_web_options(&mut web);
                    options.primitives.push(web);
                }
            }
        }
        out.push(options);

        if scope != OptionsScope::OnlyThis {
            for pad in sub_pads {
                pad.collect_web_options(scope, out);
            }
        }
    }

    /// Primary painters that carry a snapshot id.
    fn snap_painters(&self) -> Vec<(SnapId, PainterHandle)> {
        self.registry
            .borrow()
            .iter()
            .filter(|(_, entry)| !entry.is_secondary())
            .filter_map(|(_, entry)| Some((entry.snap_id.clone()?, entry.painter.clone())))
            .collect()
    }

    /// Axis ranges of the frame in user coordinates and the matching pad
    /// coordinates.
    pub fn pad_ranges(&self) -> PadRanges {
        let mut r = PadRanges::default();
        let Some(frame) = self.frame_painter().and_then(|frame| frame.frame_ranges()) else {
            return r;
        };
        r.ranges = frame.ranges_set;

        r.ux1 = log_value(frame.logx, frame.scale_xmin, 0.0);
        r.ux2 = log_value(frame.logx, frame.scale_xmax, 1.0);
        r.uy1 = log_value(frame.logy, frame.scale_ymin, 0.0);
        r.uy2 = log_value(frame.logy, frame.scale_ymax, 1.0);
        r.uz1 = frame.scale_zmin.unwrap_or(0.0);
        r.uz2 = frame.scale_zmax.unwrap_or(0.0);

        if let Some((min, max)) = frame.zoom_x.filter(|(min, max)| min != max) {
            r.zx1 = log_value(frame.logx, min, 0.0);
            r.zx2 = log_value(frame.logx, max, 1.0);
        }
        if let Some((min, max)) = frame.zoom_y.filter(|(min, max)| min != max) {
            r.zy1 = log_value(frame.logy, min, 0.0);
            r.zy2 = log_value(frame.logy, max, 1.0);
        }
        if let Some((min, max)) = frame.zoom_z.filter(|(min, max)| min != max) {
            r.zz1 = min;
            r.zz2 = max;
        }

        let rect = frame.frame_rect;
        let pad = self.pad_rect();
        let (pad_width, pad_height) = (pad.width() as f64, pad.height() as f64);
        let frame_width = if rect.width() > 0.0 { rect.width() as f64 } else { 10.0 };
        let frame_height = if rect.height() > 0.0 { rect.height() as f64 } else { 10.0 };

        let k = (r.ux2 - r.ux1) / frame_width;
        r.px1 = r.ux1 - k * rect.x() as f64;
        r.px2 = r.px1 + k * pad_width;

        let k = (r.uy2 - r.uy1) / frame_height;
        r.py1 = r.uy1 - k * (pad_height - rect.y() as f64 - rect.height() as f64);
        r.py2 = r.py1 + k * pad_height;
        r
    }

    /// Receiver for select and redraw events of the whole tree. Only the
    /// canvas keeps one.
    pub fn register_for_pad_events(&self, receiver: Option<PadEventReceiver>) {
        if let Some(canvas) = &self.canvas {
            *canvas.pad_events.borrow_mut() = receiver;
        }
    }

    pub fn produce_pad_event(
        &self,
        reason: PadEventReason,
        pad: &Rc<PadPainter>,
        painter: Option<PainterHandle>,
    ) {
        let Some(canvas) = &self.canvas else {
            return;
        };
        let receiver = canvas.pad_events.borrow().clone();
        if let Some(receiver) = receiver {
            receiver(&PadEvent {
                reason,
                pad: pad.clone(),
                painter,
            });
        }
    }

    /// Make this pad active and report the selected painter.
    pub fn select_object_painter(self: &Rc<Self>, painter: Option<PainterHandle>) {
        self.ctx.set_active_pad(self);
        if let Some(canvas) = self.canvas_painter() {
            canvas.produce_pad_event(PadEventReason::Select, self, painter);
        }
    }
}

fn legend_entry(painter: &dyn ObjectPainter) -> Option<Value> {
    let object = painter.object()?;
    let skipped = [class_names::LEGEND, class_names::HSTACK, class_names::MULTI_GRAPH];
    if object.name == "title"
        || object.name == "stats"
        || !painter.draws_content()
        || skipped.iter().any(|typename| object.is(typename))
    {
        return None;
    }
    let label = painter.item_name().unwrap_or_else(|| object.name.clone());
    Some(json!({
        "_typename": class_names::LEGEND_ENTRY,
        "fLabel": label,
        "fOption": painter.attributes_used().legend_option(),
        "fObject": object.name,
    }))
}

/// Axis value in the coordinates the server expects for the given log mode.
fn log_value(log: i32, value: f64, fallback: f64) -> f64 {
    if log == 0 {
        return value;
    }
    if value <= 0.0 {
        return fallback;
    }
    let value = value.log10();
    if log > 1 {
        value / (log as f64).log10()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfaceMode;
    use crate::painter::FrameRanges;
    use crate::registry::RegistryEntry;
    use crate::test_support::{fixture_canvas, run, Journal, RecordingPainter, RecordingTransport};
    use pad_model::{PadAttributes, PixelRect};
    use std::cell::RefCell;

    fn online_canvas(journal: &Journal) -> (Rc<crate::PaintContext>, Rc<PadPainter>, Rc<RecordingTransport>) {
        let (ctx, canvas) = fixture_canvas(journal, 800.0, 600.0);
        let transport = RecordingTransport::new();
        canvas.set_transport(Some(transport.clone()));
        canvas.state.borrow_mut().snap_id = Some(SnapId::from("1"));
        canvas.create_canvas_surface(SurfaceMode::Create, None);
        (ctx, canvas, transport)
    }

    #[test]
    fn button_names_parse_to_actions() {
        assert_eq!(ButtonAction::parse("CanvasSnapShot"), ButtonAction::CanvasSnapShot);
        assert_eq!(ButtonAction::parse("enlargePad"), ButtonAction::EnlargePad);
        assert_eq!(
            ButtonAction::parse("ToggleZoom"),
            ButtonAction::Other("ToggleZoom".to_string())
        );
    }

    #[test]
    fn sub_pad_buttons_propagate_to_canvas() {
        let journal = Journal::default();
        let (_ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        let sub = PadPainter::sub_pad(&canvas, PadAttributes::new("c1_1"));

        sub.add_pad_button("ToggleZoom", "Zoom", None);
        sub.add_pad_button("ToggleZoom", "Zoom", None);
        sub.add_pad_button("PadSnapShot", "Create PNG", None);
        sub.add_pad_button("enlargePad", "Enlarge", None);

        let names = |pad: &PadPainter| -> Vec<String> {
            pad.buttons().into_iter().map(|button| button.name).collect()
        };
        assert_eq!(names(&sub), vec!["ToggleZoom", "PadSnapShot", "enlargePad"]);
        assert_eq!(names(&canvas), vec!["ToggleZoom"]);
    }

    #[test]
    fn unknown_button_reaches_painters() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        let sub = PadPainter::sub_pad(&canvas, PadAttributes::new("c1_1"));
        canvas.add_painter(RegistryEntry::new(PainterHandle::Pad(sub.clone())));
        sub.add_painter(RegistryEntry::new(PainterHandle::Object(
            RecordingPainter::new(&journal, "TH1F", "h").handling_button("ToggleZoom"),
        )));

        assert_eq!(run(&ctx, canvas.click_button("ToggleZoom")), ButtonOutcome::Handled);
        assert_eq!(journal.entries_with_prefix("button:"), vec!["button:h:ToggleZoom"]);
        assert_eq!(run(&ctx, canvas.click_button("Nothing")), ButtonOutcome::Unhandled);
    }

    #[test]
    fn snapshot_button_exports_through_host() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        let outcome = run(&ctx, canvas.click_button("CanvasSnapShot"));
        let ButtonOutcome::Saved(request) = outcome else {
            panic!("expected export request");
        };
        assert_eq!(request.format, ImageFormat::Png);
        assert_eq!(request.filename, "c1.png");
        assert_eq!(journal.entries_with_prefix("export:"), vec!["export:c1.png"]);
    }

    #[test]
    fn offline_edit_redraws_without_sending() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        canvas.create_canvas_surface(SurfaceMode::Create, None);
        canvas.add_painter(RegistryEntry::new(PainterHandle::Object(RecordingPainter::new(
            &journal, "TH1F", "h",
        ))));

        run(&ctx, canvas.apply_edit(PadEdit::GridX(true)));
        assert_eq!(canvas.attributes().gridx, 1);
        assert_eq!(journal.count_prefix("redraw-start:h"), 1);
    }

    #[test]
    fn online_edit_sends_exec_after_local_change() {
        let journal = Journal::default();
        let (ctx, canvas, transport) = online_canvas(&journal);

        run(&ctx, canvas.apply_edit(PadEdit::TickY(2)));
        assert_eq!(canvas.attributes().ticky, 2);
        assert_eq!(transport.messages(), vec!["OBJEXEC:1:SetTicky(2)"]);

        transport.refuse();
        run(&ctx, canvas.apply_edit(PadEdit::BorderSize(4)));
        assert_eq!(canvas.attributes().border_size, 4);
        assert_eq!(transport.messages().len(), 1);
    }

    #[test]
    fn interactive_redraw_of_painter_uses_its_snapshot_id() {
        let journal = Journal::default();
        let (ctx, canvas, transport) = online_canvas(&journal);
        let painter = PainterHandle::Object(RecordingPainter::new(&journal, "TH1F", "h"));
        canvas.add_painter(RegistryEntry::new(painter.clone()).with_snap_id(Some(SnapId::from("7"))));

        run(
            &ctx,
            canvas.interactive_redraw(Some(painter), Some("exec:SetLineColor(2)".to_string())),
        );
        assert_eq!(transport.messages(), vec!["OBJEXEC:7:SetLineColor(2)"]);
        assert_eq!(journal.count_prefix("redraw-start:h"), 1);
    }

    #[test]
    fn interactive_redraw_reports_redraw_event() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        let painter = PainterHandle::Object(RecordingPainter::new(&journal, "TH1F", "h"));
        canvas.add_painter(RegistryEntry::new(painter.clone()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let expected = painter.clone();
        canvas.register_for_pad_events(Some(Rc::new(move |event: &PadEvent| {
            let same = event.painter.as_ref().is_some_and(|p| p.ptr_eq(&expected));
            sink.borrow_mut().push((event.reason, event.pad.name(), same));
        })));

        run(&ctx, canvas.interactive_redraw(Some(painter), None));
        assert_eq!(
            *seen.borrow(),
            vec![(PadEventReason::Redraw, "c1".to_string(), true)]
        );
        assert_eq!(journal.count_prefix("redraw-start:h"), 1);
    }

    #[test]
    fn context_menu_reflects_pad_state() {
        let journal = Journal::default();
        let (_ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        canvas.with_attributes_mut(|attrs| attrs.gridy = 1);

        let menu = canvas.context_menu();
        assert_eq!(
            MenuEntry::find(&menu, "Grid y"),
            Some(MenuCommand::Edit(PadEdit::GridY(false)))
        );
        assert_eq!(MenuEntry::find(&menu, "Divide/2x3"), Some(MenuCommand::Divide(2, 3)));
        assert_eq!(MenuEntry::find(&menu, "Divide/0"), Some(MenuCommand::Divide(0, 0)));
        assert!(MenuEntry::find(&menu, "Gray scale").is_some());
        assert_eq!(
            MenuEntry::find(&menu, "Save as/c1.json"),
            Some(MenuCommand::SaveAs(ImageFormat::Json))
        );
    }

    #[test]
    fn online_menu_hides_local_structure_edits() {
        let journal = Journal::default();
        let (_ctx, canvas, _transport) = online_canvas(&journal);
        let menu = canvas.context_menu();
        assert!(MenuEntry::find(&menu, "Build legend").is_none());
        assert!(MenuEntry::find(&menu, "Divide/2x2").is_none());
        assert!(MenuEntry::find(&menu, "Enlarge").is_some());
    }

    #[test]
    fn save_style_menu_stores_pad_settings() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        canvas.with_attributes_mut(|attrs| attrs.logy = 1);
        run(&ctx, canvas.run_menu_command(MenuCommand::SaveStyle));
        assert_eq!(ctx.style().i32("fOptLogy"), Some(1));
    }

    #[test]
    fn legend_collects_drawn_objects() {
        let journal = Journal::default();
        let (ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        assert!(canvas.build_legend().is_none());

        for (typename, name) in [("TH1F", "hpx"), ("TPaveText", "title"), ("TGraph", "gr")] {
            canvas.add_painter(RegistryEntry::new(PainterHandle::Object(RecordingPainter::new(
                &journal, typename, name,
            ))));
        }

        let legend = canvas.build_legend().unwrap();
        let entries = legend.field("fPrimitives").unwrap()["arr"].as_array().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["fLabel"], json!("hpx"));
        assert_eq!(entries[1]["fObject"], json!("gr"));
        assert!((legend.f64_field("fY1NDC").unwrap() - 0.74).abs() < 1e-9);
        assert!((legend.f64_field("fX2NDC").unwrap() - 0.89).abs() < 1e-9);

        assert!(run(&ctx, canvas.add_legend()));
        assert_eq!(canvas.num_painters(), 4);
    }

    #[test]
    fn events_respect_guards() {
        let journal = Journal::default();
        let (_ctx, canvas, transport) = online_canvas(&journal);

        assert!(!canvas.deliver_event(PadEventKind::Click, 1.0, 2.0, None));
        canvas.set_active(true);
        assert!(canvas.deliver_event(PadEventKind::Click, 1.0, 2.0, Some(SnapId::from("9"))));
        assert!(!canvas.deliver_event(PadEventKind::Move, 1.0, 2.0, None));

        canvas.state.borrow_mut().deliver_move_events = true;
        assert!(canvas.deliver_event(PadEventKind::Move, 3.0, 4.0, None));

        transport.refuse();
        assert!(!canvas.deliver_event(PadEventKind::Click, 1.0, 2.0, None));

        assert_eq!(
            transport.messages(),
            vec![
                r#"EVENT:["1","click","1","2","9"]"#,
                r#"EVENT:["1","move","3","4",""]"#,
            ]
        );
    }

    #[test]
    fn sub_pad_events_follow_canvas_read_only() {
        let journal = Journal::default();
        let (_ctx, canvas, transport) = online_canvas(&journal);
        let sub = PadPainter::sub_pad(&canvas, PadAttributes::new("c1_1"));
        {
            let mut state = sub.state.borrow_mut();
            state.snap_id = Some(SnapId::from("5"));
            state.read_only = true;
        }
        sub.set_active(true);
        assert!(sub.deliver_event(PadEventKind::Click, 1.0, 2.0, None));

        canvas.state.borrow_mut().read_only = true;
        assert!(!sub.deliver_event(PadEventKind::Click, 1.0, 2.0, None));
        assert_eq!(transport.messages(), vec![r#"EVENT:["5","click","1","2",""]"#]);
    }

    #[test]
    fn web_options_cover_sub_pads_and_primitives() {
        let journal = Journal::default();
        let (_ctx, canvas, _transport) = online_canvas(&journal);
        canvas.add_painter(
            RegistryEntry::new(PainterHandle::Object(RecordingPainter::new(&journal, "TH1F", "h")))
                .with_snap_id(Some(SnapId::from("3"))),
        );
        let mut attrs = PadAttributes::new("c1_1");
        attrs.set_ndc(NdcRect::new(0.5, 0.0, 0.5, 0.5));
        let sub = PadPainter::sub_pad(&canvas, attrs);
        sub.state.borrow_mut().snap_id = Some(SnapId::from("5"));
        canvas.add_painter(RegistryEntry::new(PainterHandle::Pad(sub.clone())).with_snap_id(Some(SnapId::from("5"))));
        sub.create_pad_surface(false);

        let full = canvas.get_web_pad_options(OptionsScope::Full);
        assert_eq!(full.len(), 2);
        assert_eq!((full[0].cw, full[0].ch), (800, 600));
        assert_eq!(full[0].primitives.len(), 1);
        assert_eq!(full[0].primitives[0].snapid, "3");
        assert!((full[1].xlow - 0.5).abs() < 1e-6);
        assert!((full[1].yup - 0.5).abs() < 1e-6);

        assert_eq!(canvas.get_web_pad_options(OptionsScope::OnlyThis).len(), 1);

        canvas.state.borrow_mut().read_only = true;
        assert!(canvas.get_web_pad_options(OptionsScope::Full).is_empty());
        assert_eq!(canvas.get_web_pad_options(OptionsScope::WithSubpads).len(), 2);
    }

    #[test]
    fn pad_ranges_follow_frame_scales() {
        let journal = Journal::default();
        let (_ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        canvas.create_canvas_surface(SurfaceMode::Create, None);
        assert!(!canvas.pad_ranges().ranges);

        let frame = RecordingPainter::new(&journal, "TFrame", "frame").with_ranges(FrameRanges {
            ranges_set: true,
            logx: 0,
            logy: 1,
            scale_xmin: 0.0,
            scale_xmax: 80.0,
            scale_ymin: 1.0,
            scale_ymax: 100.0,
            zoom_x: Some((10.0, 20.0)),
            zoom_y: Some((5.0, 5.0)),
            frame_rect: PixelRect::new(80.0, 60.0, 640.0, 480.0),
            ..FrameRanges::default()
        });
        canvas.add_painter(RegistryEntry::new(PainterHandle::Object(frame)));

        let r = canvas.pad_ranges();
        assert!(r.ranges);
        assert_eq!((r.ux1, r.ux2), (0.0, 80.0));
        assert_eq!((r.uy1, r.uy2), (0.0, 2.0));
        assert_eq!((r.zx1, r.zx2), (10.0, 20.0));
        assert_eq!((r.zy1, r.zy2), (0.0, 0.0));
        assert!((r.px1 + 10.0).abs() < 1e-9);
        assert!((r.px2 - 90.0).abs() < 1e-9);
        assert!((r.py1 + 0.25).abs() < 1e-9);
        assert!((r.py2 - 2.25).abs() < 1e-9);
    }

    #[test]
    fn log_values_use_fallback_for_non_positive() {
        assert_eq!(log_value(0, -3.0, 0.0), -3.0);
        assert_eq!(log_value(1, 1000.0, 0.0), 3.0);
        assert_eq!(log_value(1, 0.0, 7.0), 7.0);
        assert!((log_value(2, 8.0, 0.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn pad_events_reach_registered_receiver() {
        let journal = Journal::default();
        let (_ctx, canvas) = fixture_canvas(&journal, 800.0, 600.0);
        let sub = PadPainter::sub_pad(&canvas, PadAttributes::new("c1_1"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        canvas.register_for_pad_events(Some(Rc::new(move |event: &PadEvent| {
            sink.borrow_mut().push((event.reason, event.pad.name()));
        })));

        sub.select_object_painter(None);
        assert_eq!(*seen.borrow(), vec![(PadEventReason::Select, "c1_1".to_string())]);
        assert!(canvas.ctx().is_active_pad(&sub));
    }
}
