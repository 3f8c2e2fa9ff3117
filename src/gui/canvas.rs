use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, Ui, Vec2};
use egui_graphs::{GraphView, MetadataFrame, SettingsInteraction, SettingsNavigation};

use crate::{
    gui::{
        edge_shape::NetworkLinkShape,
        node_shape::{self, NetworkNodeShape, radius_for},
    },
    layout::{Layout, LayoutState},
    network::entity::{EntityId, EntityKind},
    topology::{TopologyEngine, popup::ViewTransform},
};

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub network: Color32,
    pub external: Color32,
    pub router: Color32,
    pub server: Color32,
    pub link: Color32,
    pub hull: Color32,
    pub text: Color32,
    pub badge: Color32,
    pub loading: Color32,
}

impl Palette {
    pub fn from_theme(theme: &catppuccin_egui::Theme) -> Self {
        Self {
            network: theme.blue,
            external: theme.peach,
            router: theme.green,
            server: theme.mauve,
            link: theme.overlay1,
            hull: theme.surface1.gamma_multiply(0.5),
            text: theme.text,
            badge: theme.red,
            loading: theme.yellow,
        }
    }

    pub fn fill(&self, kind: EntityKind) -> Color32 {
        match kind {
            EntityKind::Network => self.network,
            EntityKind::ExternalNetwork => self.external,
            EntityKind::Router => self.router,
            EntityKind::Server => self.server,
        }
    }
}

/// What the user did on the canvas this frame.
#[derive(Debug)]
pub struct CanvasResponse {
    /// The node selected once the frame was drawn.
    pub selected: Option<EntityId>,
    pub double_clicked: Option<EntityId>,
    /// Canvas to absolute screen coordinates, for anchoring popups.
    pub screen_transform: ViewTransform,
    pub rect: Rect,
}

/// Pan and zoom the graph widget last drew with.
fn screen_transform(ui: &mut Ui) -> ViewTransform {
    let meta = MetadataFrame::new(None).load(ui);
    ViewTransform {
        translate: meta.canvas_to_screen_pos(Pos2::ZERO).to_vec2(),
        scale: meta.canvas_to_screen_size(1.0),
    }
}

pub fn show(ui: &mut Ui, engine: &mut TopologyEngine, palette: &Palette) -> CanvasResponse {
    node_shape::set_palette(*palette);
    engine.resize(ui.available_size());

    // Hulls sit under the graph, so they use the previous frame's transform.
    let previous = screen_transform(ui);
    paint_hulls(ui.painter(), engine, &previous, palette);

    let response = engine.with_canvas(ui, |ui, graph| {
        ui.add(
            &mut GraphView::<_, _, _, _, NetworkNodeShape, NetworkLinkShape, LayoutState, Layout>::new(
                graph,
            )
            .with_interactions(
                &SettingsInteraction::default()
                    .with_dragging_enabled(true)
                    .with_hover_enabled(true)
                    .with_node_clicking_enabled(true)
                    .with_node_selection_enabled(true),
            )
            .with_navigations(
                &SettingsNavigation::default()
                    .with_zoom_and_pan_enabled(true)
                    .with_fit_to_screen_enabled(false),
            ),
        )
    });

    let screen = screen_transform(ui);
    paint_overlays(ui, engine, &screen, palette);

    let graph = engine.graph();
    CanvasResponse {
        selected: graph.selected(),
        double_clicked: if response.double_clicked() {
            graph.hovered()
        } else {
            None
        },
        screen_transform: screen,
        rect: response.rect,
    }
}

fn paint_hulls(painter: &Painter, engine: &TopologyEngine, screen: &ViewTransform, palette: &Palette) {
    for hull in engine.hulls() {
        let points: Vec<Pos2> = hull.polygon.iter().map(|p| screen.apply(*p)).collect();
        if points.len() >= 3 {
            painter.add(Shape::convex_polygon(
                points,
                palette.hull,
                Stroke::new(1.0, palette.hull),
            ));
        }
    }
}

/// Loading pulse and collapse badges, drawn over the nodes.
fn paint_overlays(ui: &Ui, engine: &TopologyEngine, screen: &ViewTransform, palette: &Palette) {
    let painter = ui.painter();
    let time = ui.input(|input| input.time) as f32;
    let mut loading = false;

    for (node, position) in engine.graph().positioned_nodes() {
        let center = screen.apply(position);
        let r = radius_for(node.data.kind()) * screen.scale;

        if node.loading {
            loading = true;
            let pulse = 0.5 + 0.5 * (time * 4.0).sin();
            painter.circle_filled(center, r, palette.loading.gamma_multiply(0.2 + 0.3 * pulse));
            painter.circle_stroke(center, r + 3.0, Stroke::new(2.0, palette.loading));
        }

        if let Some(count) = engine.badge(node.id()) {
            let badge_center = center + Vec2::new(r * 0.8, -r * 0.8);
            painter.circle_filled(badge_center, 8.0, palette.badge);
            painter.text(
                badge_center,
                Align2::CENTER_CENTER,
                count.to_string(),
                FontId::proportional(10.0),
                Color32::WHITE,
            );
        }
    }

    if loading {
        ui.ctx().request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_colours_by_kind() {
        let palette = Palette::from_theme(&catppuccin_egui::MOCHA);
        assert_eq!(palette.fill(EntityKind::Router), catppuccin_egui::MOCHA.green);
        assert_eq!(palette.fill(EntityKind::ExternalNetwork), catppuccin_egui::MOCHA.peach);
        assert_ne!(palette.fill(EntityKind::Network), palette.fill(EntityKind::Server));
    }
}
