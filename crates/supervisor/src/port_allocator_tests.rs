use super::*;

#[test]
fn allocate_returns_port_within_range() {
    let allocator = PortAllocator::new(21000, 21010);
    let port = allocator.allocate().unwrap();
    assert!((21000..=21010).contains(&port));
}

#[test]
fn allocate_does_not_return_the_same_port_twice() {
    let allocator = PortAllocator::new(21020, 21025);
    let mut seen = HashSet::new();
    for _ in 0..6 {
        let port = allocator.allocate().unwrap();
        assert!(seen.insert(port), "port {port} allocated twice");
    }
}

#[test]
fn exhausted_range_returns_no_ports_available() {
    let allocator = PortAllocator::new(21030, 21032);
    for _ in 0..3 {
        allocator.allocate().unwrap();
    }
    let err = allocator.allocate().unwrap_err();
    assert!(matches!(err, PortError::NoPortsAvailable { .. }));
}

#[test]
fn release_makes_port_available_again() {
    let allocator = PortAllocator::new(21040, 21040);
    let port = allocator.allocate().unwrap();
    assert!(allocator.allocate().is_err());

    allocator.release(port);
    assert_eq!(allocator.allocate().unwrap(), port);
}

#[test]
fn release_outside_range_is_a_no_op() {
    let allocator = PortAllocator::new(21050, 21055);
    allocator.release(80);
    assert_eq!(allocator.allocated_count(), 0);
}

#[test]
fn release_of_unallocated_port_is_idempotent() {
    let allocator = PortAllocator::new(21060, 21065);
    allocator.release(21062);
    allocator.release(21062);
    assert_eq!(allocator.allocated_count(), 0);
}
