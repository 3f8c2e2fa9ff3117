use std::cell::RefCell;

use egui::{FontId, Pos2, Shape, Stroke, Vec2, epaint::CircleShape};
use egui_graphs::{DisplayNode, DrawContext, NodeProps};
use petgraph::{EdgeType, stable_graph::IndexType};

use crate::{
    gui::canvas::Palette,
    network::{entity::EntityKind, network_graph::GraphNode},
};

const NODE_RADIUS: f32 = 14.0;

thread_local! {
    static PALETTE: RefCell<Option<Palette>> = const { RefCell::new(None) };
}

/// Colours for the shapes drawn this frame. Without one the widget style is used.
pub fn set_palette(palette: Palette) {
    PALETTE.with(|p| *p.borrow_mut() = Some(palette));
}

pub fn palette() -> Option<Palette> {
    PALETTE.with(|p| *p.borrow())
}

/// Radius in canvas units.
pub fn radius_for(kind: EntityKind) -> f32 {
    match kind {
        EntityKind::Network | EntityKind::ExternalNetwork => NODE_RADIUS * 1.3,
        EntityKind::Router => NODE_RADIUS,
        EntityKind::Server => NODE_RADIUS * 0.8,
    }
}

#[derive(Clone, Debug)]
pub struct NetworkNodeShape {
    pub label: String,
    pub pos: Pos2,
    pub radius: f32,
    pub selected: bool,
    pub dragged: bool,
    pub hovered: bool,
    kind: EntityKind,
}

impl From<NodeProps<GraphNode>> for NetworkNodeShape {
    fn from(node_props: NodeProps<GraphNode>) -> Self {
        let kind = node_props.payload.data.kind();
        Self {
            pos: node_props.location(),
            label: node_props.label,
            selected: node_props.selected,
            dragged: node_props.dragged,
            hovered: node_props.hovered,
            radius: radius_for(kind),
            kind,
        }
    }
}

impl<E: Clone, Ty: EdgeType, Ix: IndexType> DisplayNode<GraphNode, E, Ty, Ix> for NetworkNodeShape {
    fn closest_boundary_point(&self, dir: Vec2) -> Pos2 {
        self.pos + dir.normalized() * (self.radius + 1.0)
    }

    fn is_inside(&self, pos: Pos2) -> bool {
        (pos - self.pos).length() <= self.radius
    }

    fn shapes(&mut self, ctx: &DrawContext) -> Vec<Shape> {
        let center = ctx.meta.canvas_to_screen_pos(self.pos);
        let radius = ctx.meta.canvas_to_screen_size(self.radius);

        let style = if self.is_interacted() {
            ctx.ctx.style().visuals.widgets.active
        } else {
            ctx.ctx.style().visuals.widgets.inactive
        };
        let (fill, text) = match palette() {
            Some(palette) => (palette.fill(self.kind), palette.text),
            None => (style.fg_stroke.color, style.fg_stroke.color),
        };
        let stroke = if self.selected {
            Stroke::new(2.5, style.fg_stroke.color)
        } else if self.hovered || self.dragged {
            Stroke::new(1.5, style.fg_stroke.color)
        } else {
            Stroke::new(1.0, text.gamma_multiply(0.4))
        };

        let mut res = Vec::with_capacity(2);
        res.push(
            CircleShape {
                center,
                radius,
                fill,
                stroke,
            }
            .into(),
        );

        let galley = ctx.ctx.fonts_mut(|fonts| {
            fonts.layout_no_wrap(self.label.clone(), FontId::proportional(12.0), text)
        });
        let label_pos = center + Vec2::new(-galley.size().x / 2.0, radius + 2.0);
        res.push(Shape::galley(label_pos, galley, text));
        res
    }

    fn update(&mut self, state: &NodeProps<GraphNode>) {
        self.pos = state.location();
        self.selected = state.selected;
        self.dragged = state.dragged;
        self.hovered = state.hovered;
        self.label = state.label.to_string();
        self.kind = state.payload.data.kind();
        self.radius = radius_for(self.kind);
    }
}

impl NetworkNodeShape {
    fn is_interacted(&self) -> bool {
        self.selected || self.dragged || self.hovered
    }
}

#[cfg(test)]
mod tests {
    use petgraph::{Undirected, graph::DefaultIx};

    use super::*;
    use crate::network::edge::GraphLink;

    fn router_at(pos: Pos2) -> NetworkNodeShape {
        NetworkNodeShape {
            label: "router1".to_string(),
            pos,
            radius: radius_for(EntityKind::Router),
            selected: false,
            dragged: false,
            hovered: false,
            kind: EntityKind::Router,
        }
    }

    #[test]
    fn test_networks_draw_larger_than_servers() {
        assert!(radius_for(EntityKind::Network) > radius_for(EntityKind::Router));
        assert!(radius_for(EntityKind::Router) > radius_for(EntityKind::Server));
        assert_eq!(
            radius_for(EntityKind::ExternalNetwork),
            radius_for(EntityKind::Network)
        );
    }

    #[test]
    fn test_hit_area_is_the_circle() {
        let shape = router_at(Pos2::new(100.0, 100.0));
        let inside = |pos| {
            <NetworkNodeShape as DisplayNode<GraphNode, GraphLink, Undirected, DefaultIx>>::is_inside(
                &shape, pos,
            )
        };
        assert!(inside(Pos2::new(105.0, 100.0)));
        assert!(!inside(Pos2::new(100.0, 100.0 + NODE_RADIUS + 1.0)));

        let boundary = <NetworkNodeShape as DisplayNode<
            GraphNode,
            GraphLink,
            Undirected,
            DefaultIx,
        >>::closest_boundary_point(&shape, Vec2::new(0.0, 2.0));
        assert_eq!(boundary, Pos2::new(100.0, 100.0 + NODE_RADIUS + 1.0));
    }
}
