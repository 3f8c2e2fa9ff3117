use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use eframe::egui;
use egui::{CentralPanel, CollapsingHeader, Color32, Context, Separator, SidePanel, Ui};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
};
use tracing::{error, info, warn};

use crate::{
    actions::{ActorChannel, SnapshotFileActor, notification_bus},
    gui::{
        autopoll::{PollEvent, Poller},
        canvas::{self, Palette},
        node_panel::{FloatingNodePanel, PopupAction, popup_body},
    },
    layout::ForceLayout,
    network::entity::EntityId,
    topology::{
        DrawMode, EngineConfig, JsonFileSource, TopologyEngine,
        deletion::{NoticeLevel, Notification, UserNotice},
    },
};

const NOTICE_TTL: Duration = Duration::from_secs(6);

pub fn main(rt: Arc<Runtime>, config: EngineConfig, snapshot_path: std::path::PathBuf) {
    let native_options = eframe::NativeOptions::default();
    let result = eframe::run_native(
        "Network topology",
        native_options,
        Box::new(move |cc| Ok(Box::new(App::new(cc, rt, config, snapshot_path)) as Box<dyn eframe::App>)),
    );

    if let Err(e) = result {
        error!("{}", e);
    }
}

struct Notice {
    notice: UserNotice,
    shown_at: Instant,
}

struct App {
    engine: TopologyEngine,
    poller: Poller,
    poll_events: UnboundedReceiver<PollEvent>,
    notifications: UnboundedReceiver<Notification>,
    /// Canvas selection seen on the previous frame.
    selected: Option<EntityId>,
    palette: Palette,
    notices: VecDeque<Notice>,
    source_description: String,
    last_fetch: Option<Instant>,
    fetch_failures: usize,

    _runtime: Arc<Runtime>,
}

impl App {
    fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Arc<Runtime>,
        config: EngineConfig,
        snapshot_path: std::path::PathBuf,
    ) -> Self {
        let theme = catppuccin_egui::MOCHA;
        catppuccin_egui::set_theme(&cc.egui_ctx, theme);

        let (bus, notifications) = notification_bus();
        let actor = Arc::new(SnapshotFileActor::new(snapshot_path.clone()));
        let channel = ActorChannel::new(runtime.handle().clone(), actor, bus);

        let source = JsonFileSource::new(snapshot_path);
        let source_description = format!("file {}", source.path().display());
        let (tx, poll_events) = unbounded_channel();
        let ctx = cc.egui_ctx.clone();
        let poller = Poller::spawn(
            runtime.handle(),
            Box::new(source),
            config.poll_interval,
            tx,
            move || ctx.request_repaint(),
        );

        let engine = TopologyEngine::new(config, Box::new(ForceLayout::default()), Box::new(channel));

        Self {
            engine,
            poller,
            poll_events,
            notifications,
            selected: None,
            palette: Palette::from_theme(&theme),
            notices: VecDeque::new(),
            source_description,
            last_fetch: None,
            fetch_failures: 0,
            _runtime: runtime,
        }
    }

    /// Fold everything the background tasks produced since the last frame.
    fn read_data(&mut self) {
        while let Ok(event) = self.poll_events.try_recv() {
            match event {
                PollEvent::Snapshot(snapshot) => {
                    self.engine.apply_snapshot(&snapshot);
                    self.last_fetch = Some(Instant::now());
                }
                PollEvent::Failed(e) => {
                    self.fetch_failures += 1;
                    self.push_notice(UserNotice {
                        level: NoticeLevel::Error,
                        message: format!("Failed to fetch topology: {}", e),
                    });
                }
            }
        }

        while let Ok(notification) = self.notifications.try_recv() {
            let outcome = self.engine.handle_notification(notification);
            if let Some(notice) = outcome.notice {
                self.push_notice(notice);
            }
            if outcome.refresh_now {
                self.poller.refresh_now();
            }
        }
    }

    fn push_notice(&mut self, notice: UserNotice) {
        self.notices.push_back(Notice {
            notice,
            shown_at: Instant::now(),
        });
        while self.notices.len() > 5 {
            self.notices.pop_front();
        }
    }

    fn apply_popup_action(&mut self, action: PopupAction) {
        let result = match action {
            PopupAction::Close => {
                self.engine.hide_details();
                Ok(())
            }
            PopupAction::Delete(id) => self.engine.request_delete(&id).map_err(|e| e.to_string()),
            PopupAction::DeleteInterface { router_id, port } => self
                .engine
                .request_interface_delete(&router_id, &port)
                .map_err(|e| e.to_string()),
            PopupAction::ToggleCollapse(id) => {
                self.engine.toggle_collapse(&id).map(|_| ()).map_err(|e| e.to_string())
            }
        };
        if let Err(message) = result {
            warn!("{}", message);
            self.push_notice(UserNotice {
                level: NoticeLevel::Error,
                message,
            });
        }
    }

    fn render_side_panel(&mut self, ui: &mut Ui) {
        ui.heading("Topology");
        ui.label(&self.source_description);
        match self.last_fetch {
            Some(at) => ui.label(format!("Last snapshot {}s ago", at.elapsed().as_secs())),
            None => ui.label("Waiting for the first snapshot"),
        };
        if self.fetch_failures > 0 {
            ui.colored_label(Color32::LIGHT_RED, format!("Failed fetches: {}", self.fetch_failures));
        }
        if ui.button("Refresh now").clicked() {
            info!("manual refresh requested");
            self.poller.refresh_now();
        }

        ui.add(Separator::default());

        CollapsingHeader::new("Display").default_open(true).show(ui, |ui| {
            let mut mode = self.engine.config().draw_mode;
            ui.horizontal(|ui| {
                ui.radio_value(&mut mode, DrawMode::Incremental, "Incremental");
                ui.radio_value(&mut mode, DrawMode::Redraw, "Redraw");
            });
            if mode != self.engine.config().draw_mode {
                self.engine.set_draw_mode(mode);
            }
        });

        CollapsingHeader::new("Statistics").default_open(true).show(ui, |ui| {
            let graph = self.engine.graph();
            ui.label(format!("Nodes: {}", graph.node_count()));
            ui.label(format!("Links: {}", graph.link_count()));
            ui.label(format!("Hidden servers: {}", self.engine.side_table().len()));
            ui.label(format!("Known ports: {}", self.engine.known_ports().len()));
            ui.label(format!(
                "Layout: {}",
                if self.engine.layout().is_running() { "running" } else { "idle" }
            ));
            if let Some(pending) = self.engine.deletion().pending() {
                ui.label(format!("Pending deletion: {}", pending.source_id));
            }
        });

        ui.add(Separator::default());
        if ui.button("Print graph data").clicked() {
            info!("{}", self.engine.graph());
        }
    }

    fn render_notices(&mut self, ctx: &Context) {
        self.notices.retain(|n| n.shown_at.elapsed() < NOTICE_TTL);
        if self.notices.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("notices"))
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(12.0, -12.0))
            .show(ctx, |ui| {
                for notice in self.notices.iter() {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        let color = match notice.notice.level {
                            NoticeLevel::Info => self.palette.router,
                            NoticeLevel::Error => self.palette.badge,
                        };
                        ui.colored_label(color, &notice.notice.message);
                    });
                }
            });
        ctx.request_repaint_after(Duration::from_millis(500));
    }

    fn render(&mut self, ctx: &Context) {
        SidePanel::right("right_panel").show(ctx, |ui| self.render_side_panel(ui));

        let response = CentralPanel::default()
            .show(ctx, |ui| canvas::show(ui, &mut self.engine, &self.palette))
            .inner;

        if let Some(id) = &response.double_clicked {
            let is_network = self
                .engine
                .graph()
                .find_by_id(id)
                .is_some_and(|node| node.data.kind().is_network());
            if is_network {
                self.apply_popup_action(PopupAction::ToggleCollapse(id.clone()));
            }
        }
        if response.selected != self.selected {
            match &response.selected {
                Some(id) if !self.engine.popup().is_showing(id) => {
                    if let Err(e) = self.engine.show_details(id, &response.screen_transform) {
                        warn!("{}", e);
                    }
                }
                Some(_) => {}
                None => self.engine.hide_details(),
            }
            self.selected = response.selected.clone();
        }

        self.engine.update_popup_anchor(&response.screen_transform);
        let actions = match self.engine.popup().open() {
            Some(popup) => {
                let panel = FloatingNodePanel::for_popup(popup, response.rect.right());
                let pending = self.engine.deletion().is_pending();
                let (panel_response, mut actions) =
                    panel.show(ctx, |ui| popup_body(ui, popup, pending));
                self.engine.set_popup_size(panel_response.rect.size());
                if panel_response.close_clicked {
                    actions.push(PopupAction::Close);
                }
                actions
            }
            None => Vec::new(),
        };
        for action in actions {
            self.apply_popup_action(action);
        }
        if self.selected.is_some() && !self.engine.popup().is_open() {
            self.engine.clear_selection();
            self.selected = None;
        }

        self.render_notices(ctx);
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        self.read_data();
        if self.engine.prepare_frame() {
            ctx.request_repaint();
        }
        self.render(ctx);
    }
}
