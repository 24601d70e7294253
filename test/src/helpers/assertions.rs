/// Assert that a device's local Distribution lists the instance and its
/// component manager runs it
#[macro_export]
macro_rules! assert_hosts {
    ($network:expr, $session:expr, $instance:expr) => {
        assert!(
            $network
                .runtime($session)
                .local_distribution()
                .contains_instance(&mashup_shared::InstanceId::from($instance)),
            "{} should list component instance {} in its distribution",
            $session,
            $instance
        );
        assert!(
            $network.components($session).is_running($instance),
            "{} should run component instance {}",
            $session,
            $instance
        );
    };
}

/// Assert that a device neither lists nor runs the instance
#[macro_export]
macro_rules! assert_not_hosted {
    ($network:expr, $session:expr, $instance:expr) => {
        assert!(
            !$network
                .runtime($session)
                .local_distribution()
                .contains_instance(&mashup_shared::InstanceId::from($instance)),
            "{} should not list component instance {}",
            $session,
            $instance
        );
        assert!(
            !$network.components($session).is_running($instance),
            "{} should not run component instance {}",
            $session,
            $instance
        );
    };
}
