use crate::network::entity::EntityId;

/// A device to network attachment. Undirected for rendering purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLink {
    pub source: EntityId,
    pub target: EntityId,
}

impl GraphLink {
    pub fn new(source: impl Into<EntityId>, target: impl Into<EntityId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    pub fn key(&self) -> UndirectedLinkKey {
        UndirectedLinkKey::new(&self.source, &self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UndirectedLinkKey {
    pub a: EntityId,
    pub b: EntityId,
}

impl UndirectedLinkKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        UndirectedLinkKey {
            a: a.to_string(),
            b: b.to_string(),
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.a, &self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_undirected() {
        let forward = GraphLink::new("srv1", "net1");
        let backward = GraphLink::new("net1", "srv1");
        assert_eq!(forward.key(), backward.key());
        assert_eq!(forward.key().endpoints(), ("net1", "srv1"));
        assert!(forward.touches("net1"));
        assert!(!forward.touches("net2"));
    }
}
