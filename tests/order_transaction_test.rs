mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use common::*;
use supplylink_api::{
    entities::{order, order_item},
    errors::ServiceError,
    events::Event,
    services::orders::{CreateOrderRequest, OrderItemRequest},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn valid_order_deducts_stock_and_computes_total() {
    let mut app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;
    let mouse = seed_product(&app.db, supplier, "Mouse", dec!(50.00), 50).await;

    let order = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![
                    OrderItemRequest {
                        product_id: laptop,
                        quantity: 2,
                    },
                    OrderItemRequest {
                        product_id: mouse,
                        quantity: 5,
                    },
                ],
            },
        )
        .await
        .expect("order should be placed");

    assert_eq!(order.status, "PENDING");
    assert_eq!(order.total_amount, dec!(2250.00));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].product_name, "Laptop");
    assert_eq!(order.items[0].total_price, dec!(2000.00));

    assert_eq!(stock_level(&app.db, laptop).await, 8);
    assert_eq!(stock_level(&app.db, mouse).await, 45);

    // Post-commit event reached the sink.
    match app.events.try_recv() {
        Ok(Event::OrderCreated(id)) => assert_eq!(id, order.id),
        other => panic!("expected OrderCreated, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_second_item_rolls_back_everything() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;
    let mouse = seed_product(&app.db, supplier, "Mouse", dec!(50.00), 3).await;

    let err = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![
                    OrderItemRequest {
                        product_id: laptop,
                        quantity: 2,
                    },
                    // More than available.
                    OrderItemRequest {
                        product_id: mouse,
                        quantity: 5,
                    },
                ],
            },
        )
        .await
        .expect_err("order must fail");

    match err {
        ServiceError::InsufficientStock {
            product,
            requested,
            available,
        } => {
            assert_eq!(product, "Mouse");
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Nothing survives the rollback: no order, no items, no stock delta
    // for the first (valid) line.
    assert_eq!(stock_level(&app.db, laptop).await, 10);
    assert_eq!(stock_level(&app.db, mouse).await, 3);
    assert_eq!(
        order::Entity::find().count(&*app.db).await.unwrap(),
        0,
        "no order header may persist"
    );
    assert_eq!(
        order_item::Entity::find().count(&*app.db).await.unwrap(),
        0,
        "no order items may persist"
    );
}

#[tokio::test]
async fn price_snapshot_survives_catalog_edits() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;

    let placed = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![OrderItemRequest {
                    product_id: laptop,
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap();

    // Reprice the product afterwards.
    let model = supplylink_api::entities::product::Entity::find_by_id(laptop)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: supplylink_api::entities::product::ActiveModel = model.into();
    active.unit_price = sea_orm::Set(dec!(5000.00));
    sea_orm::ActiveModelTrait::update(active, &*app.db)
        .await
        .unwrap();

    let item = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.price_at_time_of_order, dec!(1000.00));

    let reread = app
        .services
        .orders
        .get_order(&consumer_actor(consumer), placed.id)
        .await
        .unwrap();
    assert_eq!(reread.items[0].price_at_time_of_order, dec!(1000.00));
    assert_eq!(reread.total_amount, dec!(1000.00));
}

#[tokio::test]
async fn missing_or_unaccepted_link_blocks_ordering() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;

    let request = |laptop: Uuid| CreateOrderRequest {
        supplier_id: supplier,
        items: vec![OrderItemRequest {
            product_id: laptop,
            quantity: 1,
        }],
    };

    // No link at all.
    let err = app
        .services
        .orders
        .create_order(&consumer_actor(consumer), request(laptop))
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // A PENDING link is treated the same as no link.
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Pending,
    )
    .await;
    let err = app
        .services
        .orders
        .create_order(&consumer_actor(consumer), request(laptop))
        .await
        .expect_err("pending link must not authorize");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    assert_eq!(stock_level(&app.db, laptop).await, 10);
}

#[tokio::test]
async fn cross_supplier_product_is_invalid_not_missing() {
    let app = setup().await;
    let supplier_a = seed_supplier(&app.db, "Supplier A").await;
    let supplier_b = seed_supplier(&app.db, "Supplier B").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier_a,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let foreign = seed_product(&app.db, supplier_b, "Keyboard", dec!(80.00), 10).await;

    let err = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier_a,
                items: vec![OrderItemRequest {
                    product_id: foreign,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect_err("cross-supplier reference must fail");

    assert!(
        matches!(err, ServiceError::ValidationError(_)),
        "must be a validation error, not NotFound: {err:?}"
    );
    assert_eq!(stock_level(&app.db, foreign).await, 10);
}

#[tokio::test]
async fn invalid_quantity_and_empty_items_are_rejected() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;

    let err = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![],
            },
        )
        .await
        .expect_err("empty order must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![OrderItemRequest {
                    product_id: laptop,
                    quantity: 0,
                }],
            },
        )
        .await
        .expect_err("zero quantity must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert_eq!(stock_level(&app.db, laptop).await, 10);
}

#[tokio::test]
async fn supplier_actors_cannot_place_orders() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;

    let err = app
        .services
        .orders
        .create_order(
            &supplier_actor(supplier),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![OrderItemRequest {
                    product_id: laptop,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect_err("suppliers cannot purchase");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn archived_products_are_invisible_to_new_orders() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;
    archive_product_row(&app.db, laptop).await;

    let err = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![OrderItemRequest {
                    product_id: laptop,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect_err("archived products cannot be ordered");
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert_eq!(stock_level(&app.db, laptop).await, 10);
}

#[tokio::test]
async fn order_visibility_is_scoped_to_the_two_parties() {
    let app = setup().await;
    let supplier = seed_supplier(&app.db, "Tech Supply").await;
    let consumer = seed_consumer(&app.db, "Retail Inc").await;
    let other_consumer = seed_consumer(&app.db, "Someone Else").await;
    seed_link(
        &app.db,
        supplier,
        consumer,
        supplylink_api::entities::link::LinkStatus::Accepted,
    )
    .await;
    let laptop = seed_product(&app.db, supplier, "Laptop", dec!(1000.00), 10).await;

    let placed = app
        .services
        .orders
        .create_order(
            &consumer_actor(consumer),
            CreateOrderRequest {
                supplier_id: supplier,
                items: vec![OrderItemRequest {
                    product_id: laptop,
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap();

    // Both parties see the order.
    assert!(app
        .services
        .orders
        .get_order(&consumer_actor(consumer), placed.id)
        .await
        .is_ok());
    assert!(app
        .services
        .orders
        .get_order(&supplier_actor(supplier), placed.id)
        .await
        .is_ok());

    // A third party gets NotFound, indistinguishable from absence.
    let err = app
        .services
        .orders
        .get_order(&consumer_actor(other_consumer), placed.id)
        .await
        .expect_err("foreign orders are invisible");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let listed = app
        .services
        .orders
        .list_orders(&consumer_actor(consumer), 1, 20)
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.orders[0].id, placed.id);
}
