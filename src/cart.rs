use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Course, OrderLine, OrderStatus, OrderWithItems},
    store::Store,
};

/// The courses a user has picked but not bought yet, in the order they were
/// added. Loaded from the store per request and handed around explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    course_ids: Vec<Uuid>,
}

impl CartState {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        let mut cart = Self::default();
        for id in ids {
            cart.add(id);
        }
        cart
    }

    /// Returns false when the course was already in the cart.
    pub fn add(&mut self, course_id: Uuid) -> bool {
        if self.contains(course_id) {
            return false;
        }
        self.course_ids.push(course_id);
        true
    }

    pub fn remove(&mut self, course_id: Uuid) -> bool {
        let before = self.course_ids.len();
        self.course_ids.retain(|id| *id != course_id);
        before != self.course_ids.len()
    }

    pub fn contains(&self, course_id: Uuid) -> bool {
        self.course_ids.contains(&course_id)
    }

    pub fn is_empty(&self) -> bool {
        self.course_ids.is_empty()
    }

    pub fn course_ids(&self) -> &[Uuid] {
        &self.course_ids
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddStatus {
    Added,
    AlreadyInCart,
}

#[derive(Serialize, Debug, Clone)]
pub struct CartView {
    pub courses: Vec<Course>,
    pub total_cents: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct OrderItemView {
    pub course_id: Uuid,
    pub course_title: String,
    pub price_cents: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
    pub total_cents: i64,
}

/// Turns a cart into a paid order and the matching enrollments.
pub struct OrderConverter<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderConverter<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn load(&self, user_id: Uuid) -> AppResult<CartState> {
        Ok(CartState::new(self.store.cart_course_ids(user_id).await?))
    }

    /// Writes the one row to the store, then mirrors it into `cart`. The
    /// store decides whether the course was new, so a stale `cart` cannot
    /// drop rows another request added.
    pub async fn add(
        &self,
        user_id: Uuid,
        cart: &mut CartState,
        course_id: Uuid,
    ) -> AppResult<AddStatus> {
        let course = self
            .store
            .course(course_id)
            .await?
            .filter(|c| c.is_published)
            .ok_or_else(|| AppError::not_found("course not found"))?;
        let inserted = self.store.add_cart_item(user_id, course.id).await?;
        cart.add(course.id);
        Ok(if inserted {
            AddStatus::Added
        } else {
            AddStatus::AlreadyInCart
        })
    }

    pub async fn remove(
        &self,
        user_id: Uuid,
        cart: &mut CartState,
        course_id: Uuid,
    ) -> AppResult<()> {
        self.store.remove_cart_item(user_id, course_id).await?;
        cart.remove(course_id);
        Ok(())
    }

    /// Published courses of the cart and what they cost together.
    pub async fn view(&self, cart: &CartState) -> AppResult<CartView> {
        let courses = self.purchasable(cart).await?;
        let total_cents = courses.iter().map(Course::effective_price_cents).sum();
        Ok(CartView { courses, total_cents })
    }

    /// Places a paid order for every published course in the cart, enrolls
    /// the user in each one and takes the bought courses out of the cart. The
    /// store applies all of it in one transaction.
    pub async fn checkout(
        &self,
        user_id: Uuid,
        cart: &mut CartState,
    ) -> AppResult<OrderWithItems> {
        let courses = self.purchasable(cart).await?;
        if courses.is_empty() {
            return Err(AppError::bad_request("cart is empty"));
        }
        let lines: Vec<OrderLine> = courses
            .iter()
            .map(|c| OrderLine {
                course_id: c.id,
                price_cents: c.effective_price_cents(),
            })
            .collect();

        let placed = self.store.place_order(user_id, &lines).await?;
        for line in &lines {
            cart.remove(line.course_id);
        }
        tracing::info!(
            %user_id,
            order_id = %placed.order.id,
            items = placed.items.len(),
            total_cents = placed.total_cents(),
            "order placed"
        );
        Ok(placed)
    }

    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<OrderView>> {
        let orders = self.store.orders_for_user(user_id).await?;
        let mut ids: Vec<Uuid> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.course_id))
            .collect();
        ids.sort();
        ids.dedup();
        let titles: HashMap<Uuid, String> = self
            .store
            .courses_by_ids(&ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.title))
            .collect();

        orders
            .into_iter()
            .map(|o| -> AppResult<OrderView> {
                let total_cents = o.total_cents();
                let status = o.order.status.parse().map_err(AppError::Internal)?;
                Ok(OrderView {
                    id: o.order.id,
                    status,
                    created_at: o.order.created_at,
                    items: o
                        .items
                        .into_iter()
                        .map(|i| OrderItemView {
                            course_title: titles
                                .get(&i.course_id)
                                .cloned()
                                .unwrap_or_default(),
                            course_id: i.course_id,
                            price_cents: i.price_cents,
                        })
                        .collect(),
                    total_cents,
                })
            })
            .collect()
    }

    async fn purchasable(&self, cart: &CartState) -> AppResult<Vec<Course>> {
        Ok(self
            .store
            .courses_by_ids(cart.course_ids())
            .await?
            .into_iter()
            .filter(|c| c.is_published)
            .collect())
    }
}
