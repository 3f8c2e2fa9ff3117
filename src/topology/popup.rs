/*!
Detail popup state.

At most one popup is open at a time. Showing the entity that is already open closes
the popup instead, and while a popup is open the layout is frozen so the popup's
screen anchor stays valid.
*/

use std::net::IpAddr;

use egui::{Pos2, Vec2, vec2};
use thiserror::Error;

use crate::{
    network::{
        entity::{Entity, EntityId, EntityKind},
        port::Port,
    },
    topology::engine::TopologyEngine,
};

/// Gap between the anchored node and the popup edge.
pub const POPUP_OFFSET: Vec2 = vec2(20.0, -30.0);

/// Affine model-to-screen transform of the canvas (pan and zoom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub translate: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn apply(&self, model: Pos2) -> Pos2 {
        (model.to_vec2() * self.scale + self.translate).to_pos2()
    }
}

/// Kind specific popup body.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    Network {
        external: bool,
        subnets: Vec<String>,
        instance_count: usize,
        collapsed: bool,
        add_subnet_url: Option<String>,
    },
    Router {
        ports: Vec<Port>,
        external_gateway: Option<EntityId>,
        add_interface_url: Option<String>,
    },
    Server {
        ip_addresses: Vec<IpAddr>,
        console_url: Option<String>,
    },
}

impl PopupContent {
    pub fn for_entity(entity: &Entity) -> Self {
        match entity {
            Entity::Network(network) | Entity::ExternalNetwork(network) => PopupContent::Network {
                external: entity.kind() == EntityKind::ExternalNetwork,
                subnets: network.subnets.iter().map(|s| s.to_string()).collect(),
                instance_count: network.instance_count,
                collapsed: network.collapsed,
                add_subnet_url: network.url.as_ref().map(|u| format!("{u}/subnets/create")),
            },
            Entity::Router(router) => PopupContent::Router {
                ports: router.ports.clone(),
                external_gateway: router.external_gateway.clone(),
                add_interface_url: router.url.as_ref().map(|u| format!("{u}/addinterface")),
            },
            Entity::Server(server) => PopupContent::Server {
                ip_addresses: server.ip_addresses.clone(),
                console_url: match (&server.url, &server.console) {
                    (Some(url), Some(_)) => Some(format!("{url}/console")),
                    _ => None,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPopup {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub title: String,
    pub status: String,
    pub url: Option<String>,
    pub content: PopupContent,
    /// Screen position of the node the popup belongs to.
    pub anchor: Pos2,
    /// Size of the popup as last rendered, if it has been rendered yet.
    pub measured_size: Option<Vec2>,
}

impl OpenPopup {
    fn new(entity: &Entity, anchor: Pos2) -> Self {
        Self {
            entity_id: entity.id().to_string(),
            kind: entity.kind(),
            title: entity.label(),
            status: entity.status().to_string(),
            url: entity.url().map(str::to_string),
            content: PopupContent::for_entity(entity),
            anchor,
            measured_size: None,
        }
    }

    fn refresh(&mut self, entity: &Entity) {
        self.title = entity.label();
        self.status = entity.status().to_string();
        self.url = entity.url().map(str::to_string);
        self.content = PopupContent::for_entity(entity);
    }

    /// Top-left corner of the popup inside a window `window_width` wide.
    pub fn placement(&self, window_width: f32) -> Pos2 {
        let width = self.measured_size.map(|s| s.x).unwrap_or(0.0);
        place_popup(self.anchor, width, window_width)
    }
}

/// Place the popup right of the anchor, flipping to the left side when its right edge
/// would leave the window.
pub fn place_popup(anchor: Pos2, popup_width: f32, window_width: f32) -> Pos2 {
    let right = anchor.x + POPUP_OFFSET.x;
    let x = if right + popup_width > window_width {
        anchor.x - POPUP_OFFSET.x - popup_width
    } else {
        right
    };
    Pos2::new(x, anchor.y + POPUP_OFFSET.y)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupTransition {
    Opened,
    /// Another popup was open and got closed first.
    Switched { closed: EntityId },
    /// The popup for this entity was already open; it is now closed.
    Closed,
}

#[derive(Debug, Error)]
pub enum PopupError {
    #[error("{0} is not visible")]
    NotVisible(EntityId),
}

#[derive(Debug, Default)]
pub struct DetailPopup {
    open: Option<OpenPopup>,
}

impl DetailPopup {
    pub fn open(&self) -> Option<&OpenPopup> {
        self.open.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn is_showing(&self, id: &str) -> bool {
        self.open.as_ref().is_some_and(|p| p.entity_id == id)
    }

    pub fn show(&mut self, entity: &Entity, anchor: Pos2) -> PopupTransition {
        let closed = match self.open.take() {
            Some(previous) if previous.entity_id == entity.id() => return PopupTransition::Closed,
            Some(previous) => Some(previous.entity_id),
            None => None,
        };
        self.open = Some(OpenPopup::new(entity, anchor));
        match closed {
            Some(closed) => PopupTransition::Switched { closed },
            None => PopupTransition::Opened,
        }
    }

    pub fn hide(&mut self) -> Option<OpenPopup> {
        self.open.take()
    }

    pub fn set_measured_size(&mut self, size: Vec2) {
        if let Some(open) = self.open.as_mut() {
            open.measured_size = Some(size);
        }
    }
}

impl TopologyEngine {
    /// Show the detail popup for a visible entity, or close it if it is already showing.
    pub fn show_details(
        &mut self,
        id: &str,
        transform: &ViewTransform,
    ) -> Result<PopupTransition, PopupError> {
        let (entity, position) = self
            .graph
            .find_by_id(id)
            .zip(self.graph.position(id))
            .map(|(node, position)| (node.data.clone(), position))
            .ok_or_else(|| PopupError::NotVisible(id.to_string()))?;
        let anchor = transform.apply(position);

        let transition = self.popup.show(&entity, anchor);
        match &transition {
            PopupTransition::Opened | PopupTransition::Switched { .. } => self.layout.stop(),
            PopupTransition::Closed => self.resume_after_popup(),
        }
        Ok(transition)
    }

    pub fn hide_details(&mut self) {
        if self.popup.hide().is_some() {
            self.resume_after_popup();
        }
    }

    pub fn set_popup_size(&mut self, size: Vec2) {
        self.popup.set_measured_size(size);
    }

    /// Re-anchor the open popup after the canvas was panned or zoomed.
    pub fn update_popup_anchor(&mut self, transform: &ViewTransform) {
        let Some(open) = self.popup.open.as_mut() else {
            return;
        };
        if let Some(position) = self.graph.position(&open.entity_id) {
            open.anchor = transform.apply(position);
        }
    }

    /// Rebuild the popup body from the current entity, closing it if the entity went away.
    pub(super) fn refresh_popup(&mut self) {
        let Some(open) = self.popup.open.as_mut() else {
            return;
        };
        match self.graph.find_by_id(&open.entity_id) {
            Some(node) => open.refresh(&node.data),
            None => self.hide_details(),
        }
    }

    fn resume_after_popup(&mut self) {
        if std::mem::take(&mut self.layout_restart_deferred) {
            self.layout.start();
        } else {
            self.layout.resume();
        }
    }
}
