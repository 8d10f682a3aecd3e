//! An in-process transport that hands frames directly between a server
//! and its clients through shared queues, with no serialization bugs or
//! real I/O to get in the way. Used by the integration tests and by
//! hosts that embed both roles in one process (local play, demos).
//!
//! Grounded on the teacher's `tests/connection.rs` pattern of binding two
//! real endpoints and polling them by hand; here the "socket" is a
//! `Rc<RefCell<Hub>>` instead of a `UdpSocket`.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{ClientId, ServerTransport, ServerTransportEvent, Transport, TransportEvent};
use crate::error::NetcodeError;

#[derive(Default)]
struct Hub {
    listening: bool,
    next_client_id: u64,
    server_events: VecDeque<ServerTransportEvent>,
    client_events: HashMap<u64, VecDeque<TransportEvent>>,
    connected: HashMap<u64, bool>,
}

/// Owns the shared bus. Create one per simulated network, then hand out
/// a server transport and as many client transports as needed.
#[derive(Clone)]
pub struct InMemoryNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self { hub: Rc::new(RefCell::new(Hub::default())) }
    }

    pub fn server_transport(&self) -> InMemoryServerTransport {
        InMemoryServerTransport { hub: self.hub.clone() }
    }

    pub fn client_transport(&self) -> InMemoryTransport {
        InMemoryTransport { hub: self.hub.clone(), client_id: None }
    }
}

pub struct InMemoryServerTransport {
    hub: Rc<RefCell<Hub>>,
}

impl ServerTransport for InMemoryServerTransport {
    fn listen(&mut self) -> Result<(), NetcodeError> {
        self.hub.borrow_mut().listening = true;
        Ok(())
    }

    fn send_to(&mut self, client_id: ClientId, data: &str) -> Result<(), NetcodeError> {
        let mut hub = self.hub.borrow_mut();
        if !hub.connected.get(&client_id.0).copied().unwrap_or(false) {
            return Err(NetcodeError::Transport(format!("{client_id} not connected")));
        }
        hub.client_events
            .entry(client_id.0)
            .or_default()
            .push_back(TransportEvent::Message { data: data.to_string() });
        Ok(())
    }

    fn disconnect(&mut self, client_id: ClientId, reason: &str) {
        let mut hub = self.hub.borrow_mut();
        if hub.connected.insert(client_id.0, false).unwrap_or(false) {
            hub.client_events
                .entry(client_id.0)
                .or_default()
                .push_back(TransportEvent::Disconnected { reason: reason.to_string() });
        }
    }

    fn close(&mut self) {
        let mut hub = self.hub.borrow_mut();
        let ids: Vec<u64> = hub
            .connected
            .iter()
            .filter(|(_, connected)| **connected)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            hub.connected.insert(id, false);
            hub.client_events
                .entry(id)
                .or_default()
                .push_back(TransportEvent::Disconnected { reason: "server closed".to_string() });
        }
        hub.listening = false;
    }

    fn poll(&mut self) -> Vec<ServerTransportEvent> {
        self.hub.borrow_mut().server_events.drain(..).collect()
    }

    fn connected_clients(&self) -> Vec<ClientId> {
        self.hub
            .borrow()
            .connected
            .iter()
            .filter(|(_, connected)| **connected)
            .map(|(id, _)| ClientId(*id))
            .collect()
    }

    fn is_listening(&self) -> bool {
        self.hub.borrow().listening
    }
}

pub struct InMemoryTransport {
    hub: Rc<RefCell<Hub>>,
    client_id: Option<u64>,
}

impl Transport for InMemoryTransport {
    fn connect(&mut self) -> Result<(), NetcodeError> {
        let mut hub = self.hub.borrow_mut();
        if !hub.listening {
            return Err(NetcodeError::Transport("server is not listening".to_string()));
        }
        let id = hub.next_client_id;
        hub.next_client_id += 1;
        hub.connected.insert(id, true);
        hub.client_events.entry(id).or_default().push_back(TransportEvent::Connected);
        hub.server_events.push_back(ServerTransportEvent::ClientConnected { client_id: ClientId(id) });
        drop(hub);
        self.client_id = Some(id);
        Ok(())
    }

    fn send(&mut self, data: &str) -> Result<(), NetcodeError> {
        let id = self.client_id.ok_or(NetcodeError::NotConnected)?;
        self.hub
            .borrow_mut()
            .server_events
            .push_back(ServerTransportEvent::Message { client_id: ClientId(id), data: data.to_string() });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(id) = self.client_id.take() {
            let mut hub = self.hub.borrow_mut();
            if hub.connected.insert(id, false).unwrap_or(false) {
                hub.server_events
                    .push_back(ServerTransportEvent::ClientDisconnected { client_id: ClientId(id), reason: "client closed".to_string() });
            }
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        match self.client_id {
            Some(id) => self.hub.borrow_mut().client_events.entry(id).or_default().drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn is_connected(&self) -> bool {
        match self.client_id {
            Some(id) => self.hub.borrow().connected.get(&id).copied().unwrap_or(false),
            None => false,
        }
    }
}
