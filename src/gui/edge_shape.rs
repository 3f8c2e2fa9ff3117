use egui::{Pos2, Shape, Stroke};
use egui_graphs::{DisplayEdge, DisplayNode, DrawContext, EdgeProps};
use petgraph::{EdgeType, stable_graph::IndexType};

use crate::{
    gui::node_shape::{NetworkNodeShape, palette},
    network::{edge::GraphLink, network_graph::GraphNode},
};

type WidgetNode<Ty, Ix> = egui_graphs::Node<GraphNode, GraphLink, Ty, Ix, NetworkNodeShape>;

/// Straight line between the boundaries of the two node circles.
#[derive(Clone, Debug)]
pub struct NetworkLinkShape {
    selected: bool,
}

impl From<EdgeProps<GraphLink>> for NetworkLinkShape {
    fn from(props: EdgeProps<GraphLink>) -> Self {
        Self {
            selected: props.selected,
        }
    }
}

impl<Ty: EdgeType, Ix: IndexType> DisplayEdge<GraphNode, GraphLink, Ty, Ix, NetworkNodeShape>
    for NetworkLinkShape
{
    fn shapes(
        &mut self,
        start: &WidgetNode<Ty, Ix>,
        end: &WidgetNode<Ty, Ix>,
        ctx: &DrawContext,
    ) -> Vec<Shape> {
        let (a, b) = boundary_points(start, end);
        let color = match palette() {
            Some(palette) => palette.link,
            None => ctx.ctx.style().visuals.widgets.inactive.fg_stroke.color,
        };
        let width = if self.selected { 2.5 } else { 1.5 };
        vec![Shape::line_segment(
            [ctx.meta.canvas_to_screen_pos(a), ctx.meta.canvas_to_screen_pos(b)],
            Stroke::new(width, color),
        )]
    }

    fn update(&mut self, props: &EdgeProps<GraphLink>) {
        self.selected = props.selected;
    }

    fn is_inside(&self, start: &WidgetNode<Ty, Ix>, end: &WidgetNode<Ty, Ix>, pos: Pos2) -> bool {
        let (a, b) = boundary_points(start, end);
        distance_point_to_segment(pos, a, b) <= 4.0
    }
}

/// Endpoints on the node boundaries, in canvas space.
fn boundary_points<Ty: EdgeType, Ix: IndexType>(
    start: &WidgetNode<Ty, Ix>,
    end: &WidgetNode<Ty, Ix>,
) -> (Pos2, Pos2) {
    let a = start.props().location();
    let b = end.props().location();
    let a_boundary = <NetworkNodeShape as DisplayNode<GraphNode, GraphLink, Ty, Ix>>::closest_boundary_point(
        start.display(),
        b - a,
    );
    let b_boundary = <NetworkNodeShape as DisplayNode<GraphNode, GraphLink, Ty, Ix>>::closest_boundary_point(
        end.display(),
        a - b,
    );
    (a_boundary, b_boundary)
}

fn distance_point_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ap = p - a;
    let ab = b - a;
    let ab_len2 = ab.length_sq();
    if ab_len2 <= f32::EPSILON {
        return ap.length();
    }
    let t = (ap.dot(ab) / ab_len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_segment() {
        let a = Pos2::new(0.0, 0.0);
        let b = Pos2::new(10.0, 0.0);
        assert_eq!(distance_point_to_segment(Pos2::new(5.0, 3.0), a, b), 3.0);
        // Past the end the distance is to the endpoint.
        assert_eq!(distance_point_to_segment(Pos2::new(13.0, 4.0), a, b), 5.0);
        assert_eq!(distance_point_to_segment(Pos2::new(0.0, 2.0), a, a), 2.0);
    }
}
