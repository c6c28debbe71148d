//! Recording doubles for the collaborator traits, shared by unit tests.

use crate::context::{PadConfig, PaintContext};
use crate::pad::PadPainter;
use crate::painter::{
    AttributesUsed, CanvasHost, DrawDispatcher, Drawn, FrameRanges, ObjectPainter, Transport,
};
use crate::queue::DrawKind;
use crate::LocalBoxFuture;
use glam::Vec2;
use pad_model::{class_names, PadAttributes, PixelRect, SnapObject};
use protocol::SaveRequest;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Ordered log of collaborator calls.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries_with_prefix(prefix).len()
    }
}

pub struct RecordingPainter {
    journal: Journal,
    object: RefCell<Rc<SnapObject>>,
    option: RefCell<String>,
    claims_main: Cell<bool>,
    redraw_by_resize: Cell<bool>,
    handled_button: RefCell<Option<String>>,
    ranges: Cell<Option<FrameRanges>>,
}

impl RecordingPainter {
    pub fn new(journal: &Journal, typename: &str, name: &str) -> Rc<Self> {
        Rc::new(Self {
            journal: journal.clone(),
            object: RefCell::new(Rc::new(SnapObject::new(typename, name))),
            option: RefCell::new(String::new()),
            claims_main: Cell::new(false),
            redraw_by_resize: Cell::new(false),
            handled_button: RefCell::new(None),
            ranges: Cell::new(None),
        })
    }

    fn with_object(journal: &Journal, object: Rc<SnapObject>, option: &str) -> Rc<Self> {
        Rc::new(Self {
            journal: journal.clone(),
            object: RefCell::new(object),
            option: RefCell::new(option.to_string()),
            claims_main: Cell::new(false),
            redraw_by_resize: Cell::new(false),
            handled_button: RefCell::new(None),
            ranges: Cell::new(None),
        })
    }

    pub fn claiming_main(self: Rc<Self>) -> Rc<Self> {
        self.claims_main.set(true);
        self
    }

    pub fn redrawing_on_resize(self: Rc<Self>) -> Rc<Self> {
        self.redraw_by_resize.set(true);
        self
    }

    pub fn handling_button(self: Rc<Self>, action: &str) -> Rc<Self> {
        *self.handled_button.borrow_mut() = Some(action.to_string());
        self
    }

    pub fn with_ranges(self: Rc<Self>, ranges: FrameRanges) -> Rc<Self> {
        self.ranges.set(Some(ranges));
        self
    }

    fn name(&self) -> String {
        self.object.borrow().name.clone()
    }
}

impl ObjectPainter for RecordingPainter {
    fn object(&self) -> Option<Rc<SnapObject>> {
        Some(self.object.borrow().clone())
    }

    fn draw_option(&self) -> String {
        self.option.borrow().clone()
    }

    /// Reports a visible change only when the object or option differs.
    fn update_object(&self, object: &SnapObject, option: &str) -> bool {
        self.journal.push(format!("update:{}:{}", object.name, option));
        let changed = **self.object.borrow() != *object || *self.option.borrow() != option;
        *self.object.borrow_mut() = Rc::new(object.clone());
        *self.option.borrow_mut() = option.to_string();
        changed
    }

    fn redraw(self: Rc<Self>, kind: DrawKind) -> LocalBoxFuture<'static, ()> {
        Box::pin(async move {
            let name = self.name();
            self.journal.push(format!("redraw-start:{}:{}", name, kind));
            smol::future::yield_now().await;
            self.journal.push(format!("redraw-end:{}", name));
        })
    }

    fn cleanup(&self) {
        self.journal.push(format!("cleanup:{}", self.name()));
    }

    fn need_redraw_by_resize(&self) -> bool {
        self.redraw_by_resize.get()
    }

    fn claims_main(&self) -> bool {
        self.claims_main.get()
    }

    fn is_frame(&self) -> bool {
        self.object.borrow().is(class_names::FRAME)
    }

    fn frame_ranges(&self) -> Option<FrameRanges> {
        self.ranges.get()
    }

    fn attributes_used(&self) -> AttributesUsed {
        AttributesUsed {
            line: true,
            ..AttributesUsed::default()
        }
    }

    fn reset_palette(&self) {
        self.journal.push(format!("reset_palette:{}", self.name()));
    }

    fn click_button(self: Rc<Self>, action: &str) -> Option<LocalBoxFuture<'static, ()>> {
        if self.handled_button.borrow().as_deref() != Some(action) {
            return None;
        }
        self.journal.push(format!("button:{}:{}", self.name(), action));
        Some(Box::pin(async {}))
    }
}

/// Calls back into its pad while being cleaned up.
pub struct PadQueryingPainter {
    journal: Journal,
    pad: Weak<PadPainter>,
}

impl PadQueryingPainter {
    pub fn new(journal: &Journal, pad: &Rc<PadPainter>) -> Rc<Self> {
        Rc::new(Self {
            journal: journal.clone(),
            pad: Rc::downgrade(pad),
        })
    }
}

impl ObjectPainter for PadQueryingPainter {
    fn object(&self) -> Option<Rc<SnapObject>> {
        Some(Rc::new(SnapObject::new("TLatex", "label")))
    }

    fn update_object(&self, _object: &SnapObject, _option: &str) -> bool {
        false
    }

    fn redraw(self: Rc<Self>, _kind: DrawKind) -> LocalBoxFuture<'static, ()> {
        Box::pin(async {})
    }

    fn cleanup(&self) {
        if let Some(pad) = self.pad.upgrade() {
            self.journal.push(format!(
                "cleanup:label:frame={}:painters={}",
                pad.frame_painter().is_some(),
                pad.num_painters()
            ));
        }
    }
}

/// Creates recording painters. `TH2F` drawn with `colz` gets a palette
/// secondary.
pub struct RecordingDispatcher {
    journal: Journal,
}

impl DrawDispatcher for RecordingDispatcher {
    fn draw_object(
        &self,
        pad: &Rc<PadPainter>,
        object: Rc<SnapObject>,
        option: &str,
    ) -> LocalBoxFuture<'static, Option<Drawn>> {
        let optstat = pad.ctx().style().i32("fOptStat").unwrap_or_default();
        self.journal
            .push(format!("draw:{}:optstat={}", object.name, optstat));

        let with_palette = object.is("TH2F") && option.to_lowercase().contains("colz");
        let mut drawn = Drawn::new(RecordingPainter::with_object(&self.journal, object, option));
        if with_palette {
            let palette = RecordingPainter::new(&self.journal, "TPaletteAxis", "palette");
            drawn = drawn.with_secondary("palette", Drawn::new(palette));
        }
        Box::pin(async move { Some(drawn) })
    }
}

pub struct RecordingHost {
    journal: Journal,
    size: Cell<Option<Vec2>>,
}

impl RecordingHost {
    pub fn set_size(&self, width: f32, height: f32) {
        self.size.set(Some(Vec2::new(width, height)));
    }
}

impl CanvasHost for RecordingHost {
    fn measure(&self) -> Option<Vec2> {
        self.size.get()
    }

    fn enlarge(&self, on: bool) -> bool {
        self.journal.push(format!("enlarge:{}", on));
        true
    }

    fn export(&self, request: &SaveRequest) {
        self.journal.push(format!("export:{}", request.filename));
    }

    fn attach_interactive(&self, pad: &str, _rect: PixelRect) {
        self.journal.push(format!("interactive:{}", pad));
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    messages: RefCell<Vec<String>>,
    refused: Cell<bool>,
}

impl RecordingTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Report a full channel from now on.
    pub fn refuse(&self) {
        self.refused.set(true);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|message| message.starts_with(prefix))
            .count()
    }
}

impl Transport for RecordingTransport {
    fn can_send(&self, _credits: usize) -> bool {
        !self.refused.get()
    }

    fn send(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Canvas `c1` hosted by a recording host of the given size.
pub fn fixture_canvas(journal: &Journal, width: f32, height: f32) -> (Rc<PaintContext>, Rc<PadPainter>) {
    let (ctx, canvas, _host) = fixture_with_host(journal, width, height, PadConfig::default());
    (ctx, canvas)
}

pub fn fixture_with_host(
    journal: &Journal,
    width: f32,
    height: f32,
    config: PadConfig,
) -> (Rc<PaintContext>, Rc<PadPainter>, Rc<RecordingHost>) {
    let dispatcher = Rc::new(RecordingDispatcher {
        journal: journal.clone(),
    });
    let ctx = PaintContext::new(config, dispatcher);
    let host = Rc::new(RecordingHost {
        journal: journal.clone(),
        size: Cell::new(Some(Vec2::new(width, height))),
    });
    let canvas = PadPainter::canvas(ctx.clone(), PadAttributes::canvas("c1", 0, 0), host.clone());
    (ctx, canvas, host)
}

/// Drive `future` and every task it spawns on the pad executor.
pub fn run<T>(ctx: &Rc<PaintContext>, future: impl Future<Output = T>) -> T {
    let executor = ctx.executor().clone();
    smol::block_on(executor.run(future))
}

/// Let spawned tasks and timers run for `duration`.
pub fn run_for(ctx: &Rc<PaintContext>, duration: Duration) {
    run(ctx, async move {
        smol::Timer::after(duration).await;
    });
}
