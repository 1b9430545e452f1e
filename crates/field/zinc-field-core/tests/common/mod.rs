#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use zinc_field_core::region::{NodeHandle, NodeId, Region, RegionSpec, Texture};
use zinc_field_core::{FieldModule, ManagerMessage, Subscription};

pub fn load_region(name: &str) -> Region {
    let spec: RegionSpec = zinc_test_fixtures::regions::load(name).expect("load region fixture");
    Region::from_spec(&spec).expect("build region")
}

pub fn load_texture(name: &str) -> Texture {
    zinc_test_fixtures::textures::load(name).expect("load texture fixture")
}

pub fn module_for(name: &str) -> FieldModule {
    FieldModule::new(load_region(name))
}

pub fn node(region: &Region, id: u32) -> NodeHandle {
    region.node(NodeId(id)).expect("node in fixture")
}

/// Subscribe and keep every message the manager sends.
pub fn record_messages(module: &FieldModule) -> (Rc<RefCell<Vec<ManagerMessage>>>, Subscription) {
    let messages = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&messages);
    let subscription = module
        .manager()
        .subscribe(move |message| sink.borrow_mut().push(message.clone()));
    (messages, subscription)
}
