pub const QUERY_GET_ORDER: &str = r#"
SELECT
    id,order_number,status,payment_status,total_amount,user_id
FROM orders
WHERE id=$1;
"#;

// payment_status may be NULL on rows created before the column had a default
pub const QUERY_UPDATE_ORDER_PAYMENT: &str = r#"
UPDATE orders SET
    status=$2,
    payment_status=$3,
    payment_id=COALESCE($4, payment_id),
    payment_method=COALESCE($5, payment_method),
    paid_at=COALESCE($6, paid_at),
    updated_at=$7
WHERE
    id=$1 AND
    (payment_status IS NULL OR payment_status <> ALL($8));
"#;

pub const QUERY_GET_ORDER_ITEMS: &str = r#"
SELECT
    COALESCE(mi.name, 'Menu item') AS name,
    oi.quantity,
    oi.unit_price
FROM order_items AS oi
LEFT JOIN menu_items AS mi ON (mi.id = oi.menu_item_id)
WHERE oi.order_id=$1
ORDER BY oi.created_at;
"#;

pub const QUERY_GET_HALL_BOOKING: &str = r#"
SELECT
    id,status,applicant_email,event_date
FROM hall_bookings
WHERE id=$1;
"#;

pub const QUERY_UPDATE_HALL_BOOKING_STATUS: &str = r#"
UPDATE hall_bookings SET
    status=$2,
    updated_at=$3
WHERE
    id=$1 AND
    status = ANY($4);
"#;

pub const QUERY_GET_PROFILE: &str = r#"
SELECT id,email,full_name FROM profiles WHERE id=$1;
"#;

pub const QUERY_IS_WEBHOOK_EVENT_PROCESSED: &str = r#"
SELECT EXISTS(
    SELECT 1 FROM processed_webhook_events
    WHERE event_id=$1 AND processed_at > $2
);
"#;

pub const QUERY_PRUNE_WEBHOOK_EVENTS: &str = r#"
DELETE FROM processed_webhook_events WHERE processed_at < $1;
"#;

pub const QUERY_INSERT_WEBHOOK_EVENT: &str = r#"
INSERT INTO processed_webhook_events(event_id,event_type,processed_at)
VALUES($1,$2,$3)
ON CONFLICT (event_id) DO UPDATE SET
    event_type=EXCLUDED.event_type,
    processed_at=EXCLUDED.processed_at;
"#;
