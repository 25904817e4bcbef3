use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        coupons::{
            CouponList, CouponValidation, CreateCouponRequest, UpdateCouponRequest,
            ValidateCouponRequest,
        },
        discounts::{CreateDiscountRequest, DiscountList, SetDiscountActiveRequest},
        orders::{
            CheckoutItem, CheckoutRequest, CustomerInfo, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        pricing::{
            ApplyPricesRequest, ApplyPricesResult, PriceUpdate, ProductSuggestion,
            SuggestionList, SuggestionRequest, TrendReport,
        },
        products::{
            CreateProductRequest, InventoryAdjustRequest, ProductList, ProductView, StockList,
            UpdateProductRequest,
        },
    },
    models::{
        Coupon, CouponKind, Discount, DiscountKind, Order, OrderItem, OrderStatus, Product,
    },
    pricing::{
        coupon::CouponRejection,
        suggestion::{PriceSuggestion, ReasonType, SuggestionReason},
        trend::{PriceTrend, TrendDirection},
    },
    response::{ApiResponse, Deleted, Meta},
    routes::{admin, coupons, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::product_discounts,
        products::create_product,
        products::update_product,
        products::delete_product,
        coupons::validate_coupon,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::track_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_discounts,
        admin::create_discount,
        admin::set_discount_active,
        admin::delete_discount,
        admin::list_coupons,
        admin::create_coupon,
        admin::update_coupon,
        admin::delete_coupon,
        admin::suggest_prices,
        admin::suggest_price,
        admin::apply_prices,
        admin::price_trend
    ),
    components(
        schemas(
            Product,
            ProductView,
            ProductList,
            StockList,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            Discount,
            DiscountKind,
            DiscountList,
            CreateDiscountRequest,
            SetDiscountActiveRequest,
            Coupon,
            CouponKind,
            CouponList,
            CouponRejection,
            CouponValidation,
            CreateCouponRequest,
            UpdateCouponRequest,
            ValidateCouponRequest,
            Order,
            OrderItem,
            OrderStatus,
            OrderList,
            OrderWithItems,
            CheckoutItem,
            CheckoutRequest,
            CustomerInfo,
            UpdateOrderStatusRequest,
            PriceSuggestion,
            ProductSuggestion,
            SuggestionList,
            SuggestionRequest,
            SuggestionReason,
            ReasonType,
            PriceUpdate,
            ApplyPricesRequest,
            ApplyPricesResult,
            PriceTrend,
            TrendDirection,
            TrendReport,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            Deleted,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<SuggestionList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog with effective prices"),
        (name = "Coupons", description = "Coupon validation and management"),
        (name = "Discounts", description = "Per-product discounts"),
        (name = "Orders", description = "Checkout and order tracking"),
        (name = "Pricing", description = "Price suggestions and trends"),
        (name = "Admin", description = "Order and inventory administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
