use egui::{self, CollapsingHeader, Context, Frame, Id, InnerResponse, Label, Order, Pos2, Ui};
use egui_extras::{Column, TableBuilder};

use crate::{
    network::{entity::EntityKind, port::Port},
    topology::popup::{OpenPopup, PopupContent},
};

/// A floating panel placed next to a node on the canvas.
///
/// The caller computes the position (see [`OpenPopup::placement`]); the panel reports its
/// rendered rect back so the next frame can flip it when it would leave the window.
#[derive(Debug, Clone)]
pub struct FloatingNodePanel {
    id: Id,
    position: Pos2,
    title: String,
    options: NodePanelOptions,
}

/// Rendering options for the floating panel.
#[derive(Debug, Clone)]
pub struct NodePanelOptions {
    pub min_width: f32,
    pub order: Order,
}

impl Default for NodePanelOptions {
    fn default() -> Self {
        Self {
            min_width: 240.0,
            order: Order::Foreground,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodePanelResponse {
    pub rect: egui::Rect,
    pub close_clicked: bool,
}

/// Something the user asked for from inside the popup.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupAction {
    Close,
    Delete(String),
    DeleteInterface { router_id: String, port: Port },
    ToggleCollapse(String),
}

impl FloatingNodePanel {
    pub fn for_popup(popup: &OpenPopup, window_width: f32) -> Self {
        Self {
            id: Id::new(("node_panel", popup.entity_id.as_str())),
            position: popup.placement(window_width),
            title: popup.title.clone(),
            options: NodePanelOptions::default(),
        }
    }

    pub fn show<R>(
        &self,
        ctx: &Context,
        add_contents: impl FnOnce(&mut Ui) -> R,
    ) -> (NodePanelResponse, R) {
        let mut close_clicked = false;

        let area: InnerResponse<R> = egui::Area::new(self.id)
            .order(self.options.order)
            .interactable(true)
            .constrain(true)
            .fixed_pos(self.position)
            .show(ctx, |ui| {
                Frame::popup(ui.style())
                    .show(ui, |ui| {
                        ui.set_min_width(self.options.min_width);

                        ui.horizontal(|ui| {
                            ui.strong(&self.title);
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui
                                    .add(egui::Button::new("✕").small())
                                    .on_hover_text("Close")
                                    .clicked()
                                {
                                    close_clicked = true;
                                }
                            });
                        });
                        ui.add_space(6.0);

                        add_contents(ui)
                    })
                    .inner
            });

        (
            NodePanelResponse {
                rect: area.response.rect,
                close_clicked,
            },
            area.inner,
        )
    }
}

/// Kind specific popup body. Returns the actions clicked this frame.
pub fn popup_body(ui: &mut Ui, popup: &OpenPopup, deletion_pending: bool) -> Vec<PopupAction> {
    let mut actions = Vec::new();

    ui.add(label_no_wrap(format!("{} · {}", popup.kind, popup.status)));
    ui.add(label_no_wrap(format!("ID: {}", popup.entity_id)));
    ui.separator();

    match &popup.content {
        PopupContent::Network {
            external,
            subnets,
            instance_count,
            collapsed,
            add_subnet_url,
        } => {
            if *external {
                ui.label("External network");
            }
            ui.label(format!("Instances: {}", instance_count));
            collapsible_section(ui, "Subnets", true, |ui| {
                if subnets.is_empty() {
                    ui.weak("No subnets");
                }
                bullet_list(ui, subnets.iter());
            });
            if let Some(url) = add_subnet_url {
                ui.hyperlink_to("Create subnet", url);
            }
            let label = if *collapsed { "Expand" } else { "Collapse" };
            if ui.button(label).clicked() {
                actions.push(PopupAction::ToggleCollapse(popup.entity_id.clone()));
            }
        }
        PopupContent::Router {
            ports,
            external_gateway,
            add_interface_url,
        } => {
            if let Some(gateway) = external_gateway {
                ui.add(label_no_wrap(format!("Gateway: {}", gateway)));
            }
            collapsible_section(ui, "Interfaces", true, |ui| {
                ports_table(ui, &popup.entity_id, ports, deletion_pending, &mut actions);
            });
            if let Some(url) = add_interface_url {
                ui.hyperlink_to("Add interface", url);
            }
        }
        PopupContent::Server {
            ip_addresses,
            console_url,
        } => {
            collapsible_section(ui, "IP addresses", true, |ui| {
                bullet_list(ui, ip_addresses.iter());
            });
            if let Some(url) = console_url {
                ui.hyperlink_to("Open console", url);
            }
        }
    }

    ui.separator();
    ui.horizontal(|ui| {
        let delete = ui
            .add_enabled(!deletion_pending, egui::Button::new(format!("Delete {}", popup.kind)))
            .on_disabled_hover_text("Another deletion is still pending");
        if delete.clicked() {
            actions.push(PopupAction::Delete(popup.entity_id.clone()));
        }
        if popup.kind == EntityKind::Server || popup.kind == EntityKind::Router {
            if let Some(url) = &popup.url {
                ui.hyperlink_to("Details", url);
            }
        }
    });

    actions
}

fn ports_table(
    ui: &mut Ui,
    router_id: &str,
    ports: &[Port],
    deletion_pending: bool,
    actions: &mut Vec<PopupAction>,
) {
    if ports.is_empty() {
        ui.weak("No interfaces");
        return;
    }
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(60.0))
        .column(Column::auto().at_least(90.0))
        .column(Column::auto().at_least(60.0))
        .column(Column::auto().at_least(20.0))
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Port");
            });
            header.col(|ui| {
                ui.strong("Fixed IPs");
            });
            header.col(|ui| {
                ui.strong("Status");
            });
            header.col(|_ui| {});
        })
        .body(|mut body| {
            for port in ports {
                body.row(20.0, |mut row| {
                    row.col(|ui| {
                        ui.label(port.short_id());
                    });
                    row.col(|ui| {
                        let ips: Vec<String> = port.ip_addresses().map(|ip| ip.to_string()).collect();
                        ui.add(label_no_wrap(ips.join(", ")));
                    });
                    row.col(|ui| {
                        ui.label(&port.status);
                    });
                    row.col(|ui| {
                        // Gateway ports are not removable from here.
                        if port.key().is_none() {
                            return;
                        }
                        let button = ui
                            .add_enabled(!deletion_pending, egui::Button::new("🗑").small())
                            .on_hover_text("Remove interface");
                        if button.clicked() {
                            actions.push(PopupAction::DeleteInterface {
                                router_id: router_id.to_string(),
                                port: port.clone(),
                            });
                        }
                    });
                });
            }
        });
}

/// Render a collapsible section with a standard grouped frame.
pub fn collapsible_section(
    ui: &mut Ui,
    title: impl Into<egui::WidgetText>,
    default_open: bool,
    add_contents: impl FnOnce(&mut Ui),
) {
    CollapsingHeader::new(title)
        .default_open(default_open)
        .show(ui, |ui| {
            Frame::group(ui.style()).show(ui, |ui| {
                add_contents(ui);
            });
        });
}

pub fn label_no_wrap(text: impl Into<egui::WidgetText>) -> Label {
    Label::new(text).wrap_mode(egui::TextWrapMode::Extend)
}

/// Tiny helper to render a bullet point list.
pub fn bullet_list<I, S>(ui: &mut Ui, items: I)
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    for s in items {
        ui.horizontal(|ui| {
            ui.label("•");
            ui.label(s.to_string());
        });
    }
}
