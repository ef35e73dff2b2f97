//! Ticket lifecycle integration tests.
//!
//! These tests drive the service over the in-memory repository:
//! create -> attach channel -> close, plus concurrent creation.

use std::collections::HashSet;
use std::sync::Arc;

use ticketbot_core::{
    InMemoryTicketRepository, TicketError, TicketRepository, TicketService, TicketStatus,
};

fn create_service() -> (Arc<TicketService>, Arc<InMemoryTicketRepository>) {
    let repo = Arc::new(InMemoryTicketRepository::new());
    let service = Arc::new(TicketService::new(
        Arc::clone(&repo) as Arc<dyn TicketRepository>
    ));
    (service, repo)
}

#[test]
fn test_full_lifecycle() {
    let (service, _repo) = create_service();

    let first = service.create_ticket("U1").unwrap();
    assert_eq!(first.ticket_number, 1);
    assert_eq!(first.status, TicketStatus::Open);
    assert!(first.channel_id.is_none());

    let second = service.create_ticket("U2").unwrap();
    assert_eq!(second.ticket_number, 2);

    service.update_ticket_channel_id(&first.id, "C9").unwrap();
    assert_eq!(
        service.get_ticket(&first.id).unwrap().channel_id.as_deref(),
        Some("C9")
    );

    let open: HashSet<String> = service
        .get_open_tickets()
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(open, HashSet::from([first.id.clone(), second.id.clone()]));

    let closed = service.close_ticket(&first.id).unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert!(closed.closed_at.is_some());

    let open = service.get_open_tickets().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);

    // Closed tickets are kept
    assert_eq!(service.get_all_tickets().unwrap().len(), 2);
    assert!(matches!(
        service.close_ticket(&first.id),
        Err(TicketError::InvalidState { .. })
    ));
}

#[test]
fn test_unknown_ids_fail_with_not_found() {
    let (service, _repo) = create_service();

    assert!(matches!(
        service.get_ticket("does-not-exist"),
        Err(TicketError::NotFound(_))
    ));
    assert!(matches!(
        service.update_ticket_channel_id("does-not-exist", "C1"),
        Err(TicketError::NotFound(_))
    ));
    assert!(matches!(
        service.close_ticket("does-not-exist"),
        Err(TicketError::NotFound(_))
    ));
}

#[test]
fn test_blank_user_is_rejected_without_side_effects() {
    let (service, repo) = create_service();

    assert!(matches!(
        service.create_ticket(""),
        Err(TicketError::InvalidArgument(_))
    ));
    assert_eq!(repo.count().unwrap(), 0);
    assert_eq!(service.create_ticket("U1").unwrap().ticket_number, 1);
}

#[test]
fn test_abandoned_reservation_leaves_gap() {
    let (service, _repo) = create_service();

    let reserved = service.reserve_ticket("U1").unwrap();
    assert_eq!(reserved.ticket_number, 1);
    assert!(service.get_ticket(&reserved.id).is_err());

    let next = service.create_ticket("U2").unwrap();
    assert_eq!(next.ticket_number, 2);
}

#[test]
fn test_concurrent_creation_yields_distinct_numbers() {
    let (service, repo) = create_service();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.create_ticket(&format!("U{}", i)).unwrap())
        })
        .collect();

    let tickets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let numbers: HashSet<u32> = tickets.iter().map(|t| t.ticket_number).collect();
    assert_eq!(numbers, (1..=50).collect::<HashSet<u32>>());

    let ids: HashSet<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids.len(), 50);
    assert_eq!(repo.count().unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_from_tasks() {
    let (service, _repo) = create_service();

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.create_ticket(&format!("U{}", i)) })
        })
        .collect();

    let mut numbers = HashSet::new();
    for task in tasks {
        let ticket = task.await.unwrap().unwrap();
        assert!(numbers.insert(ticket.ticket_number));
    }
    assert_eq!(numbers, (1..=50).collect::<HashSet<u32>>());
}
