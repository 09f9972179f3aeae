//! Scripted stand-in for the TWI master registers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::peripheral::{Flags, Instance};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    Address(u8),
    Write(u8),
    Read(u8),
    ReceiveNext,
    Stop,
    Flush,
    BusIdle,
}

#[derive(Default)]
struct Inner {
    ops: Vec<Op>,
    /// Flags latched by each bus event, in order.
    responses: VecDeque<Flags>,
    rx: VecDeque<u8>,
    latched: Flags,
    pending: bool,
}

/// Test-side handle on the mock's state.
#[derive(Clone)]
pub struct Bus(Rc<RefCell<Inner>>);

impl Bus {
    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().ops.clone()
    }

    /// Bytes written to the data register.
    pub fn written(&self) -> Vec<u8> {
        self.0
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(byte) => Some(*byte),
                _ => None,
            })
            .collect()
    }

    /// Flags the next bus event will latch.
    pub fn respond(&self, flags: Flags) {
        self.0.borrow_mut().responses.push_back(flags);
    }

    /// Latch flags right now.
    pub fn raise(&self, flags: Flags) {
        self.0.borrow_mut().latched = flags;
    }

    /// Bytes the slave will send.
    pub fn receive(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }
}

pub struct Mock(Rc<RefCell<Inner>>);

impl Mock {
    pub fn new() -> (Mock, Bus) {
        let inner = Rc::new(RefCell::new(Inner::default()));
        (Mock(inner.clone()), Bus(inner))
    }

    fn event(&mut self, op: Op) {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(op);
        inner.latched = inner.responses.pop_front().unwrap_or_default();
        inner.pending = true;
    }
}

impl Instance for Mock {
    fn write_address(&mut self, byte: u8) {
        self.event(Op::Address(byte));
    }

    fn write_data(&mut self, byte: u8) {
        self.event(Op::Write(byte));
    }

    fn read_data(&mut self) -> u8 {
        let mut inner = self.0.borrow_mut();
        let byte = inner.rx.pop_front().unwrap_or(0xFF);
        inner.ops.push(Op::Read(byte));
        byte
    }

    fn receive_next(&mut self) {
        self.event(Op::ReceiveNext);
    }

    fn stop(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(Op::Stop);
        inner.latched = Flags::NONE;
        inner.pending = false;
    }

    fn flags(&self) -> Flags {
        self.0.borrow().latched
    }

    fn event_pending(&self) -> bool {
        self.0.borrow().pending
    }

    fn flush(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(Op::Flush);
        inner.latched = Flags::NONE;
        inner.pending = false;
    }

    fn force_bus_idle(&mut self) {
        self.0.borrow_mut().ops.push(Op::BusIdle);
    }
}
