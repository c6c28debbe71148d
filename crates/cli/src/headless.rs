//! Headless collaborators used to replay snapshots without a display:
//! painters that only remember their object, a fixed-size host and an
//! outbox standing in for the server connection.

use glam::Vec2;
use pad_model::{class_names, PixelRect, SnapObject};
use pad_painter::{
    CanvasHost, DrawDispatcher, DrawKind, Drawn, LocalBoxFuture, ObjectPainter, PadPainter,
    PainterHandle, Transport,
};
use protocol::SaveRequest;
use regex::Regex;
use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

pub struct HeadlessPainter {
    object: RefCell<Rc<SnapObject>>,
    option: RefCell<String>,
}

impl HeadlessPainter {
    pub fn new(object: Rc<SnapObject>, option: &str) -> Rc<Self> {
        Rc::new(Self {
            object: RefCell::new(object),
            option: RefCell::new(option.to_string()),
        })
    }
}

impl ObjectPainter for HeadlessPainter {
    fn object(&self) -> Option<Rc<SnapObject>> {
        Some(self.object.borrow().clone())
    }

    fn draw_option(&self) -> String {
        self.option.borrow().clone()
    }

    fn update_object(&self, object: &SnapObject, option: &str) -> bool {
        *self.object.borrow_mut() = Rc::new(object.clone());
        *self.option.borrow_mut() = option.to_string();
        true
    }

    fn redraw(self: Rc<Self>, kind: DrawKind) -> LocalBoxFuture<'static, ()> {
        log::trace!("{} {} redraw ({})", self.class_name(), self.object_name(), kind);
        Box::pin(async {})
    }

    fn cleanup(&self) {
        log::trace!("{} {} cleanup", self.class_name(), self.object_name());
    }

    fn claims_main(&self) -> bool {
        let object = self.object.borrow();
        object.typename.starts_with("TH") && !object.is(class_names::HSTACK)
    }

    fn is_frame(&self) -> bool {
        self.object.borrow().is(class_names::FRAME)
    }

    fn draws_content(&self) -> bool {
        !self.object.borrow().is(class_names::FRAME)
    }
}

/// Creates a [`HeadlessPainter`] per object. 2D histograms drawn with a
/// `Z` option get a palette painter attached, like the real ones do.
#[derive(Default)]
pub struct HeadlessDispatcher;

impl DrawDispatcher for HeadlessDispatcher {
    fn draw_object(
        &self,
        pad: &Rc<PadPainter>,
        object: Rc<SnapObject>,
        option: &str,
    ) -> LocalBoxFuture<'static, Option<Drawn>> {
        log::debug!("Draw {} {} in {} with '{}'", object.typename, object.name, pad.name(), option);
        let palette = object.typename.starts_with("TH2") && option.to_uppercase().contains('Z');
        let mut drawn = Drawn::new(HeadlessPainter::new(object, option));
        if palette {
            let axis = Rc::new(SnapObject::new("TPaletteAxis", "palette"));
            drawn = drawn.with_secondary("palette", Drawn::new(HeadlessPainter::new(axis, "")));
        }
        Box::pin(async move { Some(drawn) })
    }
}

pub struct HeadlessHost {
    size: Vec2,
    exports: RefCell<Vec<SaveRequest>>,
}

impl HeadlessHost {
    pub fn new(width: f32, height: f32) -> Rc<Self> {
        Rc::new(Self {
            size: Vec2::new(width, height),
            exports: RefCell::new(Vec::new()),
        })
    }

    pub fn exports(&self) -> Vec<SaveRequest> {
        self.exports.borrow().clone()
    }
}

impl CanvasHost for HeadlessHost {
    fn measure(&self) -> Option<Vec2> {
        Some(self.size)
    }

    fn export(&self, request: &SaveRequest) {
        log::info!("Export {} as {}", request.filename, request.format);
        self.exports.borrow_mut().push(request.clone());
    }

    fn attach_interactive(&self, pad: &str, rect: PixelRect) {
        log::trace!("Interactive area for {}: {:?}", pad, rect);
    }
}

/// Collects outbound messages instead of sending them.
#[derive(Default)]
pub struct Outbox {
    messages: RefCell<Vec<String>>,
}

impl Outbox {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }
}

impl Transport for Outbox {
    fn can_send(&self, _credits: usize) -> bool {
        true
    }

    fn send(&self, message: &str) {
        log::debug!("Outbound {}", message);
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Indented listing of the painter tree. With a filter only objects whose
/// class or name match are listed; pads are always shown.
pub fn format_tree(pad: &PadPainter, filter: Option<&Regex>) -> String {
    let mut out = String::new();
    let rect = pad.pad_rect();
    let _ = writeln!(
        out,
        "{} {} [{}] {}x{}+{}+{}",
        pad.class_name(),
        pad.name(),
        pad.snap_id().map(|id| id.to_string()).unwrap_or_default(),
        rect.width(),
        rect.height(),
        rect.x(),
        rect.y()
    );
    write_entries(pad, filter, 1, &mut out);
    out
}

fn write_entries(pad: &PadPainter, filter: Option<&Regex>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let entries: Vec<(String, bool, PainterHandle)> = pad
        .registry()
        .iter()
        .map(|(_, entry)| {
            let id = entry.snap_id.as_ref().map(|id| id.to_string()).unwrap_or_default();
            (id, entry.is_secondary(), entry.painter.clone())
        })
        .collect();

    for (id, secondary, painter) in entries {
        match &painter {
            PainterHandle::Pad(sub) => {
                let rect = sub.pad_rect();
                let _ = writeln!(
                    out,
                    "{}{} {} [{}] {}x{}+{}+{}{}",
                    indent,
                    sub.class_name(),
                    sub.name(),
                    id,
                    rect.width(),
                    rect.height(),
                    rect.x(),
                    rect.y(),
                    if sub.is_visible() { "" } else { " hidden" }
                );
                write_entries(sub, filter, depth + 1, out);
            }
            PainterHandle::Object(object) => {
                let class = object.class_name();
                let name = object.object_name();
                if filter.is_some_and(|re| !re.is_match(&class) && !re.is_match(&name)) {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "{}{} {} [{}] '{}'{}",
                    indent,
                    class,
                    name,
                    id,
                    object.draw_option(),
                    if secondary { " (secondary)" } else { "" }
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pad_model::PadAttributes;
    use pad_painter::{PadConfig, PaintContext};
    use protocol::{SnapshotEntry, SnapshotKind};

    fn replay(entries: Vec<SnapshotEntry>) -> Rc<PadPainter> {
        let ctx = PaintContext::new(PadConfig::default(), Rc::new(HeadlessDispatcher));
        let canvas = PadPainter::canvas(
            ctx.clone(),
            PadAttributes::canvas("c1", 0, 0),
            HeadlessHost::new(800.0, 600.0),
        );
        let snap = SnapshotEntry {
            primitives: Some(entries),
            ..SnapshotEntry::new(SnapshotKind::SubPad, "1", PadAttributes::canvas("c1", 0, 0).to_object())
        };
        let executor = ctx.executor().clone();
        smol::block_on(executor.run(canvas.apply_snapshot(snap))).unwrap();
        canvas
    }

    #[test]
    fn colz_histogram_gets_palette() {
        let canvas = replay(vec![
            SnapshotEntry::object("5", SnapObject::new("TFrame", ""), ""),
            SnapshotEntry::object("6", SnapObject::new("TH2F", "h2"), "colz"),
        ]);
        let tree = format_tree(&canvas, None);
        assert!(tree.starts_with("TCanvas c1 [1] 800x600+0+0"));
        assert!(tree.contains("  TH2F h2 [6] 'colz'\n"));
        assert!(tree.contains("  TPaletteAxis palette [6#palette] '' (secondary)\n"));
        assert!(canvas.main_painter().is_some());
    }

    #[test]
    fn filter_hides_other_objects() {
        let canvas = replay(vec![
            SnapshotEntry::object("5", SnapObject::new("TGraph", "gr"), "al"),
            SnapshotEntry::object("6", SnapObject::new("TH1F", "hpx"), ""),
        ]);
        let filter = Regex::new("^TH").unwrap();
        let tree = format_tree(&canvas, Some(&filter));
        assert!(tree.contains("TH1F hpx"));
        assert!(!tree.contains("TGraph"));
    }

    #[test]
    fn outbox_drains_messages() {
        let outbox = Outbox::new();
        outbox.send("SAVE:{}");
        assert_eq!(outbox.take(), vec!["SAVE:{}"]);
        assert!(outbox.take().is_empty());
    }
}
