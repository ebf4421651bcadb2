//! Example replaying a short client conversation against an in-memory server
//!
//! A Generic Access service and a Battery service are registered, then a
//! scripted client negotiates the MTU, discovers services, reads the device
//! name and performs a long write.

use attserver::att::{
    AttPermissions, AttServer, AttServerConfig, DispatchOutcome, MemoryDatabase, SessionId,
    ATT_EXCHANGE_MTU_REQ, ATT_EXECUTE_WRITE_REQ, ATT_PREPARE_WRITE_REQ, ATT_READ_BY_GROUP_TYPE_REQ,
    ATT_READ_REQ,
};
use attserver::Uuid;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let database = Arc::new(MemoryDatabase::new());

    database.add_primary_service(Uuid::from_u16(0x1800))?;
    let name_handle = database.add_characteristic(
        0x0A, // read | write
        Uuid::from_u16(0x2A00),
        b"attserver demo".to_vec(),
        AttPermissions::read_write(),
    )?;
    database.add_primary_service(Uuid::from_u16(0x180F))?;
    database.add_characteristic(
        0x12, // read | notify
        Uuid::from_u16(0x2A19),
        vec![87],
        AttPermissions::read_only(),
    )?;
    println!("Registered {} attributes", database.len());

    let config = AttServerConfig::default().with_local_mtu(64);
    let server = AttServer::new(database.clone(), config)?;
    let mut session = server.accept_client(SessionId(0x0040));

    let [lo, hi] = name_handle.to_le_bytes();
    let script: Vec<Vec<u8>> = vec![
        vec![ATT_EXCHANGE_MTU_REQ, 64, 0],
        vec![ATT_READ_BY_GROUP_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28],
        vec![ATT_READ_REQ, lo, hi],
        [vec![ATT_PREPARE_WRITE_REQ, lo, hi, 0, 0], b"a longer name, ".to_vec()].concat(),
        [vec![ATT_PREPARE_WRITE_REQ, lo, hi, 15, 0], b"written twice".to_vec()].concat(),
        vec![ATT_EXECUTE_WRITE_REQ, 0x01],
        vec![ATT_READ_REQ, lo, hi],
    ];

    for pdu in &script {
        println!("-> {}", hex::encode(pdu));
        match server.handle_att_pdu(&mut session, pdu)? {
            DispatchOutcome::Response(rsp) => println!("<- {}", hex::encode(rsp)),
            DispatchOutcome::Deferred => println!("<- (deferred)"),
            DispatchOutcome::Silent => println!("<- (no response)"),
        }
    }

    let name = server.read_local(name_handle, 0)?;
    println!("Device name is now {:?}", String::from_utf8_lossy(&name));

    let notification = server.build_notification(&session, name_handle + 3, &[86])?;
    println!("Battery notification: {}", hex::encode(notification));

    server.disconnect_client(session);
    Ok(())
}
